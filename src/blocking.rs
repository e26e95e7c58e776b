//! Blocking forms of the verb functions.
//!
//! Each call drives the async call to completion on a private
//! current-thread runtime. Do not call these from inside an async runtime;
//! use the async functions there.

use crate::{dispatch, request::ApiRequest, response::ApiResponse, session::Session, Result};
use serde::de::DeserializeOwned;
use std::future::Future;

fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

/// Blocking [`post`](crate::post).
pub fn post_sync<Res, Req>(
    uri: &str,
    request: &mut Req,
    session: Option<&Session>,
) -> Result<ApiResponse<Res>>
where
    Res: DeserializeOwned,
    Req: ApiRequest,
{
    block_on(dispatch::post(uri, request, session))?
}

/// Blocking [`get`](crate::get).
pub fn get_sync<Res, Req>(
    uri: &str,
    request: &mut Req,
    session: Option<&Session>,
) -> Result<ApiResponse<Res>>
where
    Res: DeserializeOwned,
    Req: ApiRequest,
{
    block_on(dispatch::get(uri, request, session))?
}

/// Blocking [`put`](crate::put).
pub fn put_sync<Res, Req>(
    uri: &str,
    request: &mut Req,
    session: Option<&Session>,
) -> Result<ApiResponse<Res>>
where
    Res: DeserializeOwned,
    Req: ApiRequest,
{
    block_on(dispatch::put(uri, request, session))?
}

/// Blocking [`delete`](crate::delete).
pub fn delete_sync<Res, Req>(
    uri: &str,
    request: &mut Req,
    session: Option<&Session>,
) -> Result<ApiResponse<Res>>
where
    Res: DeserializeOwned,
    Req: ApiRequest,
{
    block_on(dispatch::delete(uri, request, session))?
}

/// Blocking [`delete_with_body`](crate::delete_with_body).
pub fn delete_with_body_sync<Res, Req>(
    uri: &str,
    request: &mut Req,
    session: Option<&Session>,
) -> Result<ApiResponse<Res>>
where
    Res: DeserializeOwned,
    Req: ApiRequest,
{
    block_on(dispatch::delete_with_body(uri, request, session))?
}
