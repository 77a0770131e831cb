//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Requests and results cross the boundary as opaque pointers; C only sees
//! the method enum, the status codes returned by setters and the completion
//! callback signature. String conversions live here to keep `lib.rs`
//! focused on the `extern "C"` surface.

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;

use nettask_core::{HttpMethod, NetworkResult, Request};

/// Opaque handle to a configured `Request`.
pub struct FfiRequest {
    pub(crate) inner: Request,
}

/// Opaque handle to a `NetworkResult`. Owned by the C caller once handed out.
pub struct FfiNetworkResult {
    pub(crate) inner: NetworkResult,
}

impl FfiNetworkResult {
    pub(crate) fn boxed(inner: NetworkResult) -> *mut Self {
        Box::into_raw(Box::new(FfiNetworkResult { inner }))
    }
}

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Delete = 3,
}

impl From<FfiHttpMethod> for HttpMethod {
    fn from(m: FfiHttpMethod) -> Self {
        match m {
            FfiHttpMethod::Get => HttpMethod::Get,
            FfiHttpMethod::Post => HttpMethod::Post,
            FfiHttpMethod::Put => HttpMethod::Put,
            FfiHttpMethod::Delete => HttpMethod::Delete,
        }
    }
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Delete => FfiHttpMethod::Delete,
        }
    }
}

/// Outcome of a configuration call.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiStatus {
    Ok = 0,
    NullArg = 1,
    InvalidUtf8 = 2,
    Panic = 3,
}

/// Completion callback. Receives ownership of `result`; free it with
/// `nt_result_free`. `user_data` is passed through untouched.
pub type FfiCompletion =
    Option<extern "C" fn(result: *mut FfiNetworkResult, user_data: *mut c_void)>;

/// Caller context carried to the worker thread.
pub(crate) struct UserData(pub(crate) *mut c_void);

// The C caller guarantees `user_data` may be used from the worker thread.
unsafe impl Send for UserData {}

impl UserData {
    pub(crate) fn into_inner(self) -> *mut c_void {
        self.0
    }
}

/// Borrow a C string as `&str`.
pub(crate) fn read_str<'a>(ptr: *const c_char, name: &str) -> Result<&'a str, FfiStatus> {
    if ptr.is_null() {
        log::error!("null argument: {name}");
        return Err(FfiStatus::NullArg);
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().map_err(|e| {
        log::error!("{name} is not valid UTF-8: {e}");
        FfiStatus::InvalidUtf8
    })
}

/// Hand a Rust string to C. Text after an interior NUL is cut off.
pub(crate) fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(c) => c.into_raw(),
        Err(e) => {
            let end = e.nul_position();
            let mut bytes = e.into_vec();
            bytes.truncate(end);
            CString::new(bytes)
                .map(CString::into_raw)
                .unwrap_or(std::ptr::null_mut())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_conversions_round_trip() {
        for m in [
            FfiHttpMethod::Get,
            FfiHttpMethod::Post,
            FfiHttpMethod::Put,
            FfiHttpMethod::Delete,
        ] {
            assert_eq!(FfiHttpMethod::from(HttpMethod::from(m)), m);
        }
    }

    #[test]
    fn read_str_rejects_null_and_bad_utf8() {
        assert_eq!(read_str(std::ptr::null(), "x").unwrap_err(), FfiStatus::NullArg);
        let bad = [0xffu8, 0xfe, 0];
        assert_eq!(
            read_str(bad.as_ptr() as *const c_char, "x").unwrap_err(),
            FfiStatus::InvalidUtf8
        );
        let good = CString::new("ok").unwrap();
        assert_eq!(read_str(good.as_ptr(), "x").unwrap(), "ok");
    }

    #[test]
    fn to_c_string_truncates_at_nul() {
        let ptr = to_c_string("ab\0cd".to_string());
        let back = unsafe { CString::from_raw(ptr) };
        assert_eq!(back.to_str().unwrap(), "ab");
    }
}
