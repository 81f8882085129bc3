use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::error;

use meritx_core::MeritxError;

use crate::routes::AppState;

/// Response-extension marker: the scope that owned this request is gone and
/// no response may be written. [`abandon_cancelled`] converts any marked
/// response into silence on the wire.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Abandoned;

/// Translates the domain error taxonomy into HTTP status codes at the
/// boundary. A cancelled scope is the one outcome that is not a status
/// code at all; anything without a dedicated mapping is logged and
/// reported as a bare 500.
pub struct ApiError(pub MeritxError);

impl From<MeritxError> for ApiError {
    fn from(e: MeritxError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            // Cancellation writes nothing: mark the response and let the
            // outer layer hold the connection instead of answering.
            MeritxError::Cancelled => {
                let mut response = ().into_response();
                response.extensions_mut().insert(Abandoned);
                return response;
            }
            MeritxError::DeadlineExceeded => StatusCode::REQUEST_TIMEOUT,
            MeritxError::BadInput(_) => StatusCode::BAD_REQUEST,
            MeritxError::LuhnInvalid => StatusCode::UNPROCESSABLE_ENTITY,
            // Absent user and wrong password are deliberately
            // indistinguishable to the client.
            MeritxError::Unauthorized
            | MeritxError::UserNotFound
            | MeritxError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            MeritxError::UserAlreadyExists
            | MeritxError::BelongsToAnotherUser
            | MeritxError::WithdrawalOrderExists => StatusCode::CONFLICT,
            // Re-uploading one's own order number is a success to the
            // client even though the intake protocol reports it as a
            // distinct outcome.
            MeritxError::AlreadyUploadedBySameUser => StatusCode::OK,
            MeritxError::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            MeritxError::OrderExists
            | MeritxError::OrderNotFound
            | MeritxError::Storage(_)
            | MeritxError::Accrual(_)
            | MeritxError::Internal(_) => {
                error!(error = %self.0, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, status.canonical_reason().unwrap_or_default()).into_response()
    }
}

/// Outermost layer: requests whose scope was cancelled produce no response.
///
/// A request that begins after the process-wide scope fired, or whose
/// handler surfaced [`MeritxError::Cancelled`], is held open without a
/// byte written; the connection is torn down by the client's disconnect or
/// by the shutdown drain. In-flight requests that complete normally during
/// the drain window still get their response.
pub async fn abandon_cancelled(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if state.cancel.is_cancelled() {
        return std::future::pending().await;
    }
    let response = next.run(req).await;
    if response.extensions().get::<Abandoned>().is_some() {
        return std::future::pending().await;
    }
    response
}

#[cfg(test)]
mod test {
    use super::*;

    fn status_of(e: MeritxError) -> StatusCode {
        ApiError(e).into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_documented_status_codes() {
        assert_eq!(status_of(MeritxError::DeadlineExceeded), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(status_of(MeritxError::BadInput("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(MeritxError::LuhnInvalid), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_of(MeritxError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(MeritxError::UserNotFound), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(MeritxError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(MeritxError::UserAlreadyExists), StatusCode::CONFLICT);
        assert_eq!(status_of(MeritxError::AlreadyUploadedBySameUser), StatusCode::OK);
        assert_eq!(status_of(MeritxError::BelongsToAnotherUser), StatusCode::CONFLICT);
        assert_eq!(status_of(MeritxError::PaymentRequired), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(status_of(MeritxError::WithdrawalOrderExists), StatusCode::CONFLICT);
        assert_eq!(status_of(MeritxError::Internal("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_of(MeritxError::Storage("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn cancelled_is_abandoned_not_a_status_code() {
        let response = ApiError(MeritxError::Cancelled).into_response();
        assert!(
            response.extensions().get::<Abandoned>().is_some(),
            "cancellation must be marked for abandonment, not answered"
        );

        // A slow dependency, by contrast, is a real 408 with no marker.
        let response = ApiError(MeritxError::DeadlineExceeded).into_response();
        assert!(response.extensions().get::<Abandoned>().is_none());
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
