//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{circulation, health, holds, jobs};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Biblos Circulation API",
        version = "0.9.0",
        description = "School library circulation backend REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Circulation
        circulation::checkout,
        circulation::checkin,
        circulation::renew_loan,
        circulation::set_item_status,
        circulation::list_loans,
        // Holds
        holds::create_hold,
        holds::cancel_hold,
        holds::fulfill_hold,
        holds::get_hold,
        holds::list_holds,
        holds::expire_ready,
        // Jobs
        jobs::enqueue_expire_ready,
        jobs::get_job,
    ),
    components(
        schemas(
            // Circulation
            circulation::CheckoutRequest,
            circulation::CheckinRequest,
            circulation::RenewRequest,
            circulation::ItemStatusRequest,
            crate::models::item::Item,
            crate::models::item::ItemStatus,
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            crate::services::circulation::CheckinOutcome,
            crate::services::circulation::RenewOutcome,
            // Holds
            holds::CreateHoldRequest,
            holds::CancelHoldRequest,
            holds::FulfillHoldRequest,
            holds::ExpireReadyRequest,
            crate::models::hold::Hold,
            crate::models::hold::HoldStatus,
            crate::services::holds::ExpireMode,
            crate::services::holds::FulfillOutcome,
            crate::models::job::ExpireReadySummary,
            // Jobs
            jobs::EnqueueExpireReadyRequest,
            crate::models::job::BackgroundJob,
            crate::models::job::JobKind,
            crate::models::job::JobStatus,
            crate::models::job::ExpireReadyPayload,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "circulation", description = "Checkout, checkin and renewal"),
        (name = "holds", description = "Hold queue management"),
        (name = "jobs", description = "Background job queue")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
