//! Purpose: C ABI bridge for foreign bindings (libpubkycore).
//! Exports: `pubky_call`, `pubky_buf_free`, event callback registration, `pubky_version`.
//! Role: Stable ABI surface over the `sdk` facade; Python loads it through ctypes.
//! Invariants: JSON bytes in/out; every buffer handed out is released with `pubky_buf_free`.
//! Invariants: Return codes are 0 (success), 1 (operation error) and -1 (caller misuse).
#![allow(non_camel_case_types)]

use crate::core::error::{Error, ErrorKind};
use crate::events::EventListener;
use crate::sdk;
use serde_json::Value;
use std::ffi::{CStr, CString, c_void};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Arc;

#[repr(C)]
pub struct pubky_buf {
    data: *mut u8,
    len: usize,
}

pub type pubky_event_callback = extern "C" fn(user_data: *mut c_void, event: *const c_char);

/// Calls the facade function `name` with a JSON array of string (or null) arguments and
/// writes the `[status, data]` JSON array into `out`.
#[unsafe(no_mangle)]
pub extern "C" fn pubky_call(
    name: *const c_char,
    args_json: *const u8,
    args_len: usize,
    out: *mut pubky_buf,
) -> i32 {
    if out.is_null() {
        return -1;
    }
    let request = read_name(name).and_then(|name| {
        let args = parse_args(args_json, args_len)?;
        let op = sdk::operation(&name).ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message(format!("unknown function '{name}'"))
        })?;
        if !op.accepts(&args) {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "{name} expects {} required and {} optional argument(s)",
                op.required, op.optional
            )));
        }
        Ok((op, args))
    });
    let (code, response) = match request {
        Ok((op, args)) => match op.invoke(&args) {
            Ok(data) => (0, vec![sdk::SUCCESS.to_string(), data]),
            Err(err) => (1, vec![sdk::ERROR.to_string(), err.detail()]),
        },
        Err(err) => (-1, vec![sdk::ERROR.to_string(), err.detail()]),
    };
    match write_buf(out, &response) {
        Ok(()) => code,
        Err(_) => -1,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn pubky_buf_free(buf: *mut pubky_buf) {
    if buf.is_null() {
        return;
    }
    unsafe {
        let buf = &mut *buf;
        if !buf.data.is_null() {
            let slice = ptr::slice_from_raw_parts_mut(buf.data, buf.len);
            drop(Box::from_raw(slice));
        }
        buf.data = ptr::null_mut();
        buf.len = 0;
    }
}

struct CallbackListener {
    callback: pubky_event_callback,
    user_data: *mut c_void,
}

// The caller promises `user_data` may be used from any thread until the callback is removed.
unsafe impl Send for CallbackListener {}
unsafe impl Sync for CallbackListener {}

impl EventListener for CallbackListener {
    fn on_event_occurred(&self, event_data: String) {
        let Ok(text) = CString::new(event_data) else {
            tracing::warn!("event contains an interior nul byte; dropped");
            return;
        };
        (self.callback)(self.user_data, text.as_ptr());
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn pubky_set_event_callback(
    callback: Option<pubky_event_callback>,
    user_data: *mut c_void,
) -> i32 {
    let Some(callback) = callback else {
        return -1;
    };
    crate::events::notifier().set_listener(Arc::new(CallbackListener {
        callback,
        user_data,
    }));
    0
}

#[unsafe(no_mangle)]
pub extern "C" fn pubky_remove_event_callback() {
    sdk::remove_event_listener();
}

#[unsafe(no_mangle)]
pub extern "C" fn pubky_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr().cast()
}

fn read_name(name: *const c_char) -> Result<String, Error> {
    if name.is_null() {
        return Err(Error::new(ErrorKind::Usage).with_message("name is null"));
    }
    unsafe { CStr::from_ptr(name) }
        .to_str()
        .map(str::to_string)
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("name is not valid UTF-8"))
}

fn parse_args(bytes: *const u8, len: usize) -> Result<Vec<Option<String>>, Error> {
    if bytes.is_null() || len == 0 {
        return Ok(Vec::new());
    }
    let slice = unsafe { std::slice::from_raw_parts(bytes, len) };
    let text = std::str::from_utf8(slice).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid json utf-8")
            .with_source(err)
    })?;
    let value: Value = serde_json::from_str(text).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid json")
            .with_source(err)
    })?;
    let items = value
        .as_array()
        .ok_or_else(|| Error::new(ErrorKind::Usage).with_message("args must be a json array"))?;
    items
        .iter()
        .map(|item| match item {
            Value::Null => Ok(None),
            Value::String(text) => Ok(Some(text.clone())),
            Value::Bool(flag) => Ok(Some(flag.to_string())),
            _ => Err(Error::new(ErrorKind::Usage)
                .with_message("args must be strings, booleans or null")),
        })
        .collect()
}

fn write_buf(out: *mut pubky_buf, response: &[String]) -> Result<(), Error> {
    let json_bytes = serde_json::to_vec(response).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to serialize response")
            .with_source(err)
    })?;
    unsafe {
        let buf = &mut *out;
        let data = Box::into_raw(json_bytes.into_boxed_slice());
        buf.len = data.len();
        buf.data = data.cast();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{pubky_buf, pubky_buf_free, pubky_call, pubky_version};
    use std::ffi::{CStr, CString};
    use std::ptr;

    fn call(name: &str, args: &str) -> (i32, Vec<String>) {
        let name = CString::new(name).expect("name");
        let mut out = pubky_buf {
            data: ptr::null_mut(),
            len: 0,
        };
        let code = pubky_call(name.as_ptr(), args.as_ptr(), args.len(), &mut out);
        let bytes = unsafe { std::slice::from_raw_parts(out.data, out.len) }.to_vec();
        pubky_buf_free(&mut out);
        assert!(out.data.is_null());
        (code, serde_json::from_slice(&bytes).expect("response json"))
    }

    #[test]
    fn success_error_and_misuse_codes() {
        let (code, response) = call("validate_mnemonic_phrase", r#"["nope"]"#);
        assert_eq!(code, 0);
        assert_eq!(response, vec!["success", "false"]);

        let (code, response) = call("get_public_key_from_secret_key", r#"["zz"]"#);
        assert_eq!(code, 1);
        assert_eq!(response[0], "error");

        let (code, _) = call("no_such_function", "[]");
        assert_eq!(code, -1);
        let (code, _) = call("resolve", "[]");
        assert_eq!(code, -1);
        let (code, _) = call("resolve", "{");
        assert_eq!(code, -1);
    }

    #[test]
    fn null_out_is_misuse() {
        let name = CString::new("generate_mnemonic_phrase").expect("name");
        assert_eq!(pubky_call(name.as_ptr(), ptr::null(), 0, ptr::null_mut()), -1);
    }

    #[test]
    fn version_is_static_c_string() {
        let version = unsafe { CStr::from_ptr(pubky_version()) };
        assert_eq!(version.to_str().expect("utf8"), env!("CARGO_PKG_VERSION"));
    }
}
