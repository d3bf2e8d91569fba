//! Panic recovery.
//!
//! A panic inside a handler, or a handler returning a fault, is turned into
//! `500 Internal Server Error` whose body is the quoted panic message. The
//! connection and the process keep serving.
//!
//! The stack of a panic is captured by a process-wide panic hook while the
//! panicking frames still exist, and picked up here after unwinding.

use axum::extract::Request;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::Once;

use crate::http::response::Fault;

thread_local! {
    /// Stack of the most recent panic on this thread.
    static PANIC_STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Chain a hook that records the panicking stack in front of the current one.
///
/// Idempotent. The previous hook still runs, so default panic output is kept.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let stack = Backtrace::force_capture().to_string();
            PANIC_STACK.with(|slot| *slot.borrow_mut() = Some(stack));
            previous(info);
        }));
    });
}

fn take_panic_stack() -> Option<String> {
    PANIC_STACK.with(|slot| slot.borrow_mut().take())
}

pub async fn recover(request: Request, next: Next) -> Response {
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => {
            let unhandled = response
                .extensions()
                .get::<Fault>()
                .filter(|fault| fault.stack.is_none())
                .map(|fault| fault.message.clone());
            match unhandled {
                Some(message) => recovered(message, Backtrace::force_capture().to_string()),
                None => response,
            }
        }
        Err(payload) => {
            // Unwinding runs on the thread that panicked, so the hook's
            // capture is in this thread's slot.
            let stack = take_panic_stack().unwrap_or_else(|| Backtrace::force_capture().to_string());
            recovered(panic_message(&*payload), stack)
        }
    }
}

fn recovered(message: String, stack: String) -> Response {
    tracing::error!(error = %message, stack = %stack, "Recovered from panic.");

    let body = format!("{message:?}");
    let mut response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response();
    response.extensions_mut().insert(Fault {
        message,
        stack: Some(stack),
    });
    response
}

/// Text of a panic payload. Non-string payloads render as `Box<dyn Any>`.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    #[inline(never)]
    fn detonate() -> &'static str {
        panic!("handler blew up")
    }

    async fn boom() -> &'static str {
        detonate()
    }

    fn router() -> Router {
        install_panic_hook();
        Router::new()
            .route("/boom", get(boom))
            .route("/ok", get(|| async { "fine" }))
            .route(
                "/fault",
                get(|| async { crate::http::response::EchoError::Fault("panic test".to_string()) }),
            )
            .layer(axum::middleware::from_fn(recover))
    }

    async fn call(path: &str) -> (StatusCode, String, Option<Fault>) {
        let response = router()
            .oneshot(axum::http::Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let fault = response.extensions().get::<Fault>().cloned();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap(), fault)
    }

    #[tokio::test]
    async fn test_panic_becomes_500() {
        let (status, body, fault) = call("/boom").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "\"handler blew up\"");
        let stack = fault.unwrap().stack.unwrap();
        assert!(stack.contains("detonate"), "stack lacks the panicking frame:\n{stack}");
    }

    #[tokio::test]
    async fn test_fault_rendered_like_panic() {
        let (status, body, fault) = call("/fault").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "\"panic test\"");
        assert_eq!(fault.unwrap().message, "panic test");
    }

    #[tokio::test]
    async fn test_normal_response_untouched() {
        let (status, body, fault) = call("/ok").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "fine");
        assert!(fault.is_none());
    }

    #[test]
    fn test_panic_message_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(&*owned), "owned");
        assert_eq!(panic_message(&*borrowed), "borrowed");
        assert_eq!(panic_message(&*other), "Box<dyn Any>");
    }
}
