//! Conversion of view return values into responses.
//!
//! The [`Responder`] trait lets a view return plain values (strings, bytes,
//! tuples with a status code, `Result`s) and have them turned into a
//! `Response<ResponseBody>`. A failing conversion is a [`HandlerError`] and
//! takes the same path through the chain as any other view error.

use std::convert::Infallible;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};

use crate::body::ResponseBody;
use crate::error::HandlerError;
use crate::request::RequestContext;

pub trait Responder {
    fn response_to(self, req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError>;
}

/// Builds a plain text response with the given status.
pub fn text_response(status: StatusCode, body: impl Into<ResponseBody>) -> Response<ResponseBody> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

/// `Err` takes the error path of the chain.
impl<T: Responder, E: Into<HandlerError>> Responder for Result<T, E> {
    fn response_to(self, req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError> {
        match self {
            Ok(t) => t.response_to(req),
            Err(e) => Err(e.into()),
        }
    }
}

/// `None` is answered as not found.
impl<T: Responder> Responder for Option<T> {
    fn response_to(self, req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError> {
        match self {
            Some(t) => t.response_to(req),
            None => Err(HandlerError::not_found(req.path())),
        }
    }
}

impl<B> Responder for Response<B>
where
    B: Into<ResponseBody>,
{
    fn response_to(self, _req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError> {
        Ok(self.map(Into::into))
    }
}

impl<T: Responder> Responder for (StatusCode, T) {
    fn response_to(self, req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError> {
        let (status, responder) = self;
        let mut response = responder.response_to(req)?;
        *response.status_mut() = status;
        Ok(response)
    }
}

impl<T: Responder> Responder for (T, StatusCode) {
    fn response_to(self, req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError> {
        let (responder, status) = self;
        (status, responder).response_to(req)
    }
}

impl<T: Responder> Responder for Box<T> {
    fn response_to(self, req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError> {
        (*self).response_to(req)
    }
}

impl Responder for () {
    fn response_to(self, _req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError> {
        Ok(Response::new(ResponseBody::empty()))
    }
}

impl Responder for &'static str {
    fn response_to(self, _req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError> {
        Ok(text_response(StatusCode::OK, self))
    }
}

impl Responder for String {
    fn response_to(self, _req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError> {
        Ok(text_response(StatusCode::OK, self))
    }
}

impl Responder for Bytes {
    fn response_to(self, _req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError> {
        Ok(Response::new(ResponseBody::once(self)))
    }
}

impl Responder for ResponseBody {
    fn response_to(self, _req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError> {
        Ok(Response::new(self))
    }
}

impl Responder for Infallible {
    fn response_to(self, _req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError> {
        match self {}
    }
}
