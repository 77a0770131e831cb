//! C-ABI wrapper around `nettask-core`.
//!
//! # Overview
//! Lets any language with a C FFI configure a request, execute it in the
//! background and receive the result through a plain function pointer,
//! without linking to Rust's threading or HTTP stack directly.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Configuration calls return an `FfiStatus`; constructors return null on
//!   bad input.
//! - The completion callback receives ownership of an `FfiNetworkResult`.
//!   The C caller owns all returned pointers and must call the matching
//!   `nt_*_free` function to release them.
//! - Null inputs to the result constructors never fail: they produce an
//!   empty, unsuccessful result and log the problem.

pub mod types;

use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use nettask_core::{NetworkResult, Request, TransportError};

use types::*;

// ---------------------------------------------------------------------------
// Request lifecycle
// ---------------------------------------------------------------------------

/// Create a request for `url` using `method`.
///
/// Returns null if `url` is null or not UTF-8.
/// The caller must free the returned pointer with `nt_request_free`.
#[unsafe(no_mangle)]
pub extern "C" fn nt_request_new(url: *const c_char, method: FfiHttpMethod) -> *mut FfiRequest {
    catch_unwind(|| match read_str(url, "url") {
        Ok(url) => Box::into_raw(Box::new(FfiRequest {
            inner: Request::new(url, method.into()),
        })),
        Err(_) => std::ptr::null_mut(),
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a request created by `nt_request_new`. Safe to call with null.
///
/// Requests already executed keep running; their callbacks still fire.
#[unsafe(no_mangle)]
pub extern "C" fn nt_request_free(req: *mut FfiRequest) {
    if !req.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(req) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Request configuration
// ---------------------------------------------------------------------------

/// Run `apply` on the request behind `req`, mapping nulls and panics.
fn configure(req: *mut FfiRequest, apply: impl FnOnce(&mut Request) -> FfiStatus) -> FfiStatus {
    catch_unwind(AssertUnwindSafe(|| {
        if req.is_null() {
            log::error!("null argument: request");
            return FfiStatus::NullArg;
        }
        let req = unsafe { &mut *req };
        apply(&mut req.inner)
    }))
    .unwrap_or(FfiStatus::Panic)
}

/// Same as `configure` for calls taking a key and a value.
fn configure_pair(
    req: *mut FfiRequest,
    key: *const c_char,
    value: *const c_char,
    apply: impl FnOnce(&mut Request, &str, &str),
) -> FfiStatus {
    configure(req, |inner| {
        let key = match read_str(key, "key") {
            Ok(k) => k,
            Err(status) => return status,
        };
        let value = match read_str(value, "value") {
            Ok(v) => v,
            Err(status) => return status,
        };
        apply(inner, key, value);
        FfiStatus::Ok
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn nt_request_set_url(req: *mut FfiRequest, url: *const c_char) -> FfiStatus {
    configure(req, |inner| match read_str(url, "url") {
        Ok(url) => {
            inner.set_url(url);
            FfiStatus::Ok
        }
        Err(status) => status,
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn nt_request_set_method(req: *mut FfiRequest, method: FfiHttpMethod) -> FfiStatus {
    configure(req, |inner| {
        inner.set_method(method.into());
        FfiStatus::Ok
    })
}

/// Add a request header. A later call with the same key replaces the value.
#[unsafe(no_mangle)]
pub extern "C" fn nt_request_add_header(
    req: *mut FfiRequest,
    key: *const c_char,
    value: *const c_char,
) -> FfiStatus {
    configure_pair(req, key, value, |inner, k, v| inner.add_header(k, v))
}

/// Add a query parameter, encoded when the request executes.
#[unsafe(no_mangle)]
pub extern "C" fn nt_request_add_parameter(
    req: *mut FfiRequest,
    key: *const c_char,
    value: *const c_char,
) -> FfiStatus {
    configure_pair(req, key, value, |inner, k, v| inner.add_parameter(k, v))
}

/// Add a form field; any form field turns the body into a urlencoded form.
#[unsafe(no_mangle)]
pub extern "C" fn nt_request_add_form_field(
    req: *mut FfiRequest,
    key: *const c_char,
    value: *const c_char,
) -> FfiStatus {
    configure_pair(req, key, value, |inner, k, v| inner.add_form_field(k, v))
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Execute `req` in the background.
///
/// Returns immediately. `callback` is invoked exactly once, on a worker
/// thread, with a result the callee owns. The request may be reconfigured or
/// freed as soon as this returns.
#[unsafe(no_mangle)]
pub extern "C" fn nt_request_execute(
    req: *const FfiRequest,
    callback: FfiCompletion,
    user_data: *mut c_void,
) -> FfiStatus {
    catch_unwind(AssertUnwindSafe(|| {
        if req.is_null() {
            log::error!("null argument: request");
            return FfiStatus::NullArg;
        }
        let Some(callback) = callback else {
            log::error!("null argument: callback");
            return FfiStatus::NullArg;
        };
        let req = unsafe { &*req };
        let user_data = UserData(user_data);
        req.inner.execute(move |result| {
            callback(FfiNetworkResult::boxed(result), user_data.into_inner());
        });
        FfiStatus::Ok
    }))
    .unwrap_or(FfiStatus::Panic)
}

/// Execute `req` on the calling thread and return the result.
///
/// Returns null only if `req` is null.
#[unsafe(no_mangle)]
pub extern "C" fn nt_request_execute_blocking(req: *const FfiRequest) -> *mut FfiNetworkResult {
    catch_unwind(AssertUnwindSafe(|| {
        if req.is_null() {
            log::error!("null argument: request");
            return std::ptr::null_mut();
        }
        let req = unsafe { &*req };
        FfiNetworkResult::boxed(req.inner.execute_blocking())
    }))
    .unwrap_or_else(|_| panic_result("panic in nt_request_execute_blocking"))
}

fn panic_result(msg: &str) -> *mut FfiNetworkResult {
    FfiNetworkResult::boxed(NetworkResult::from_failure(TransportError::Protocol(
        msg.to_string(),
    )))
}

// ---------------------------------------------------------------------------
// Result construction
// ---------------------------------------------------------------------------

/// Build a successful result holding `text` as UTF-8.
///
/// A null or non-UTF-8 `text` yields an empty, unsuccessful result whose
/// error message says which of the two it was.
#[unsafe(no_mangle)]
pub extern "C" fn nt_result_from_text(text: *const c_char) -> *mut FfiNetworkResult {
    catch_unwind(|| {
        let result = match read_str(text, "text") {
            Ok(text) => NetworkResult::from_text(text),
            Err(FfiStatus::InvalidUtf8) => {
                NetworkResult::from_failure(TransportError::InvalidInput("text"))
            }
            Err(_) => NetworkResult::from_failure(TransportError::MissingInput("text")),
        };
        FfiNetworkResult::boxed(result)
    })
    .unwrap_or_else(|_| panic_result("panic in nt_result_from_text"))
}

/// Build a result from `len` bytes at `data`.
///
/// With `has_status` the 2xx test on `status` decides success; otherwise the
/// result is successful. A null `data` with a non-zero `len` yields an
/// empty, unsuccessful result.
#[unsafe(no_mangle)]
pub extern "C" fn nt_result_from_bytes(
    data: *const u8,
    len: usize,
    has_status: bool,
    status: u16,
) -> *mut FfiNetworkResult {
    catch_unwind(|| {
        let body = if len == 0 {
            Vec::new()
        } else if data.is_null() {
            log::error!("null argument: data ({len} bytes announced)");
            return FfiNetworkResult::boxed(NetworkResult::from_failure(
                TransportError::MissingInput("data"),
            ));
        } else {
            unsafe { std::slice::from_raw_parts(data, len) }.to_vec()
        };
        let result = if has_status {
            NetworkResult::from_bytes_with_status(body, status)
        } else {
            NetworkResult::from_bytes(body)
        };
        FfiNetworkResult::boxed(result)
    })
    .unwrap_or_else(|_| panic_result("panic in nt_result_from_bytes"))
}

// ---------------------------------------------------------------------------
// Result accessors
// ---------------------------------------------------------------------------

fn with_result<T>(res: *const FfiNetworkResult, default: T, read: impl FnOnce(&NetworkResult) -> T) -> T {
    if res.is_null() {
        return default;
    }
    let res = unsafe { &*res };
    catch_unwind(AssertUnwindSafe(|| read(&res.inner))).unwrap_or(default)
}

/// False for a null result.
#[unsafe(no_mangle)]
pub extern "C" fn nt_result_is_success(res: *const FfiNetworkResult) -> bool {
    with_result(res, false, NetworkResult::is_success)
}

/// Write the HTTP status to `out` and return true, or return false when the
/// request failed before a response arrived.
#[unsafe(no_mangle)]
pub extern "C" fn nt_result_status(res: *const FfiNetworkResult, out: *mut u16) -> bool {
    with_result(res, false, |r| match r.status() {
        Some(status) => {
            if !out.is_null() {
                unsafe { *out = status };
            }
            true
        }
        None => false,
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn nt_result_length(res: *const FfiNetworkResult) -> usize {
    with_result(res, 0, NetworkResult::len)
}

/// Borrow the body. The pointer stays valid until `nt_result_free`.
/// Writes the length to `out_len` when it is not null.
#[unsafe(no_mangle)]
pub extern "C" fn nt_result_body(res: *const FfiNetworkResult, out_len: *mut usize) -> *const u8 {
    with_result(res, std::ptr::null(), |r| {
        if !out_len.is_null() {
            unsafe { *out_len = r.len() };
        }
        r.as_slice().as_ptr()
    })
}

/// Body decoded as UTF-8. Free with `nt_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn nt_result_text(res: *const FfiNetworkResult) -> *mut c_char {
    with_result(res, std::ptr::null_mut(), |r| to_c_string(r.text()))
}

#[unsafe(no_mangle)]
pub extern "C" fn nt_result_has_error(res: *const FfiNetworkResult) -> bool {
    with_result(res, false, |r| r.error().is_some())
}

/// Message of the captured failure, or null. Free with `nt_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn nt_result_error_message(res: *const FfiNetworkResult) -> *mut c_char {
    with_result(res, std::ptr::null_mut(), |r| match r.error() {
        Some(e) => to_c_string(e.to_string()),
        None => std::ptr::null_mut(),
    })
}

/// Value of response header `key`, or null. Free with `nt_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn nt_result_header(res: *const FfiNetworkResult, key: *const c_char) -> *mut c_char {
    with_result(res, std::ptr::null_mut(), |r| {
        let Ok(key) = read_str(key, "key") else {
            return std::ptr::null_mut();
        };
        match r.header(key) {
            Some(value) => to_c_string(value.to_string()),
            None => std::ptr::null_mut(),
        }
    })
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a result from any `nt_*` function or callback. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn nt_result_free(res: *mut FfiNetworkResult) {
    if !res.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(res) });
        }));
    }
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn nt_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use std::net::SocketAddr;
    use std::sync::mpsc::{self, Sender};
    use std::sync::OnceLock;
    use std::time::Duration;

    fn server() -> SocketAddr {
        static ADDR: OnceLock<SocketAddr> = OnceLock::new();
        *ADDR.get_or_init(|| {
            let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = std_listener.local_addr().unwrap();
            std_listener.set_nonblocking(true).unwrap();
            std::thread::spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                rt.block_on(async {
                    let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
                    mock_server::run(listener).await
                })
                .unwrap();
            });
            addr
        })
    }

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        nt_free_string(ptr);
        s
    }

    fn new_request(path: &str, method: FfiHttpMethod) -> *mut FfiRequest {
        let url = c(&format!("http://{}{path}", server()));
        let req = nt_request_new(url.as_ptr(), method);
        assert!(!req.is_null());
        req
    }

    #[test]
    fn request_new_and_free() {
        let url = c("http://localhost:3000");
        let req = nt_request_new(url.as_ptr(), FfiHttpMethod::Get);
        assert!(!req.is_null());
        nt_request_free(req);
    }

    #[test]
    fn request_new_null_returns_null() {
        assert!(nt_request_new(std::ptr::null(), FfiHttpMethod::Get).is_null());
    }

    #[test]
    fn request_free_null_is_safe() {
        nt_request_free(std::ptr::null_mut());
    }

    #[test]
    fn configuration_updates_request() {
        let url = c("http://localhost:3000/a");
        let req = nt_request_new(url.as_ptr(), FfiHttpMethod::Get);

        let new_url = c("http://localhost:3000/b");
        assert_eq!(nt_request_set_url(req, new_url.as_ptr()), FfiStatus::Ok);
        assert_eq!(nt_request_set_method(req, FfiHttpMethod::Post), FfiStatus::Ok);
        let (k, v) = (c("gender"), c("female"));
        assert_eq!(nt_request_add_header(req, k.as_ptr(), v.as_ptr()), FfiStatus::Ok);
        assert_eq!(nt_request_add_parameter(req, k.as_ptr(), v.as_ptr()), FfiStatus::Ok);
        assert_eq!(nt_request_add_form_field(req, k.as_ptr(), v.as_ptr()), FfiStatus::Ok);

        let inner = unsafe { &(*req).inner };
        assert_eq!(inner.url(), "http://localhost:3000/b");
        assert_eq!(FfiHttpMethod::from(inner.method()), FfiHttpMethod::Post);
        assert_eq!(inner.headers().get("gender").map(String::as_str), Some("female"));
        assert_eq!(inner.parameters().len(), 1);
        assert_eq!(inner.form_fields().len(), 1);

        nt_request_free(req);
    }

    #[test]
    fn configuration_rejects_nulls() {
        let v = c("v");
        assert_eq!(
            nt_request_add_header(std::ptr::null_mut(), v.as_ptr(), v.as_ptr()),
            FfiStatus::NullArg
        );

        let url = c("http://localhost:3000");
        let req = nt_request_new(url.as_ptr(), FfiHttpMethod::Get);
        assert_eq!(
            nt_request_add_parameter(req, std::ptr::null(), v.as_ptr()),
            FfiStatus::NullArg
        );
        assert_eq!(
            nt_request_add_form_field(req, v.as_ptr(), std::ptr::null()),
            FfiStatus::NullArg
        );
        assert_eq!(nt_request_set_url(req, std::ptr::null()), FfiStatus::NullArg);
        nt_request_free(req);
    }

    #[test]
    fn result_from_text_accessors() {
        let text = c("hello");
        let res = nt_result_from_text(text.as_ptr());
        assert!(nt_result_is_success(res));
        assert_eq!(nt_result_length(res), 5);
        assert!(!nt_result_has_error(res));
        assert!(nt_result_error_message(res).is_null());
        let mut status = 0u16;
        assert!(!nt_result_status(res, &mut status));
        assert_eq!(take_string(nt_result_text(res)), "hello");
        nt_result_free(res);
    }

    #[test]
    fn result_from_null_text_is_empty_failure() {
        let res = nt_result_from_text(std::ptr::null());
        assert!(!res.is_null());
        assert!(!nt_result_is_success(res));
        assert!(nt_result_has_error(res));
        assert_eq!(nt_result_length(res), 0);
        assert_eq!(take_string(nt_result_error_message(res)), "missing input: text");
        nt_result_free(res);
    }

    #[test]
    fn result_from_invalid_utf8_text_reports_invalid_input() {
        let bad = [b'a', 0xff, 0xfe, 0];
        let res = nt_result_from_text(bad.as_ptr() as *const c_char);
        assert!(!nt_result_is_success(res));
        assert_eq!(nt_result_length(res), 0);
        assert_eq!(
            take_string(nt_result_error_message(res)),
            "invalid input: text is not valid UTF-8"
        );
        nt_result_free(res);
    }

    #[test]
    fn result_from_bytes_with_status() {
        let data = [1u8, 2, 3];
        let res = nt_result_from_bytes(data.as_ptr(), data.len(), true, 404);
        assert!(!nt_result_is_success(res));
        let mut status = 0u16;
        assert!(nt_result_status(res, &mut status));
        assert_eq!(status, 404);

        let mut len = 0usize;
        let body = nt_result_body(res, &mut len);
        assert_eq!(unsafe { std::slice::from_raw_parts(body, len) }, &data);
        nt_result_free(res);
    }

    #[test]
    fn result_from_null_bytes_is_empty_failure() {
        let res = nt_result_from_bytes(std::ptr::null(), 10, false, 0);
        assert!(!nt_result_is_success(res));
        assert!(nt_result_has_error(res));
        assert_eq!(nt_result_length(res), 0);
        nt_result_free(res);

        let res = nt_result_from_bytes(std::ptr::null(), 0, false, 0);
        assert!(nt_result_is_success(res));
        nt_result_free(res);
    }

    #[test]
    fn accessors_on_null_result_are_safe() {
        assert!(!nt_result_is_success(std::ptr::null()));
        assert_eq!(nt_result_length(std::ptr::null()), 0);
        assert!(nt_result_text(std::ptr::null()).is_null());
        assert!(nt_result_body(std::ptr::null(), std::ptr::null_mut()).is_null());
        nt_result_free(std::ptr::null_mut());
        nt_free_string(std::ptr::null_mut());
    }

    extern "C" fn forward(result: *mut FfiNetworkResult, user_data: *mut c_void) {
        let tx = unsafe { Box::from_raw(user_data as *mut Sender<usize>) };
        tx.send(result as usize).unwrap();
    }

    fn execute_and_wait(req: *const FfiRequest) -> *mut FfiNetworkResult {
        let (tx, rx) = mpsc::channel::<usize>();
        let user_data = Box::into_raw(Box::new(tx)) as *mut c_void;
        assert_eq!(nt_request_execute(req, Some(forward), user_data), FfiStatus::Ok);
        rx.recv_timeout(Duration::from_secs(10)).unwrap() as *mut FfiNetworkResult
    }

    #[test]
    fn execute_delivers_result_to_callback() {
        let req = new_request("/echo", FfiHttpMethod::Post);
        let (k, v) = (c("gender"), c("female"));
        nt_request_add_form_field(req, k.as_ptr(), v.as_ptr());

        let res = execute_and_wait(req);
        nt_request_free(req);

        assert!(nt_result_is_success(res));
        let echo: serde_json::Value =
            serde_json::from_str(&take_string(nt_result_text(res))).unwrap();
        assert_eq!(echo["method"], "POST");
        assert_eq!(echo["body"], "gender=female");
        let ct = c("content-type");
        assert_eq!(take_string(nt_result_header(res, ct.as_ptr())), "application/json");
        nt_result_free(res);
    }

    #[test]
    fn execute_reports_not_found_without_error() {
        let req = new_request("/missing", FfiHttpMethod::Get);
        let res = execute_and_wait(req);
        nt_request_free(req);

        let mut status = 0u16;
        assert!(nt_result_status(res, &mut status));
        assert_eq!(status, 404);
        assert!(!nt_result_has_error(res));
        assert_eq!(take_string(nt_result_text(res)), "not found");
        nt_result_free(res);
    }

    #[test]
    fn execute_rejects_null_callback() {
        let req = new_request("/echo", FfiHttpMethod::Get);
        assert_eq!(
            nt_request_execute(req, None, std::ptr::null_mut()),
            FfiStatus::NullArg
        );
        nt_request_free(req);
    }

    #[test]
    fn execute_blocking_returns_result() {
        let req = new_request("/status/201", FfiHttpMethod::Get);
        let res = nt_request_execute_blocking(req);
        nt_request_free(req);

        assert!(nt_result_is_success(res));
        assert_eq!(take_string(nt_result_text(res)), "status 201");
        nt_result_free(res);
    }
}
