//! Turns a resolved configuration into one transport call.

use crate::config::RequestConfig;
use crate::error::HttpError;
use crate::headers::{Headers, flatten_headers};
use crate::response::HttpResponse;
use crate::transform::{Transformers, transform};
use crate::transport::Transport;
use crate::url::{build_url, combine_url, is_absolute_url};
use http::Method;

/// Absolute or base-joined URL with the serialized query appended.
#[must_use]
pub fn transform_url(config: &RequestConfig) -> String {
    let url = config.url.as_deref().unwrap_or_default();
    let joined = match config.base_url.as_deref() {
        Some(base) if !is_absolute_url(url) => combine_url(base, url),
        _ => url.to_owned(),
    };
    build_url(
        &joined,
        config.params.as_ref(),
        config.params_serializer.as_ref(),
    )
}

/// Send `config` through `transport`.
///
/// Steps: cancellation pre-check, URL resolution, request transforms, header
/// flattening, transport call, response transforms. A failure carrying a
/// response has that response's data transformed before it is returned.
///
/// # Errors
///
/// Returns the cancellation reason when the token is already cancelled, a
/// transform failure, or whatever the transport fails with.
pub async fn dispatch_request(
    mut config: RequestConfig,
    transport: &dyn Transport,
) -> Result<HttpResponse, HttpError> {
    if let Some(token) = &config.cancel_token
        && let Err(reason) = token.throw_if_requested()
    {
        return Err(HttpError::cancelled(reason).with_config(config));
    }

    config.url = Some(transform_url(&config));

    let headers = config.headers.get_or_insert_with(Headers::new);
    config.data = match transform(config.data.take(), headers, config.transform_request.as_ref())
    {
        Ok(data) => data,
        Err(err) => return Err(err.with_config(config)),
    };

    let method = config.method.clone().unwrap_or(Method::GET);
    config.headers = Some(flatten_headers(
        config.headers.as_ref().unwrap_or(&Headers::new()),
        &method,
    ));

    tracing::debug!(
        %method,
        url = config.url.as_deref().unwrap_or_default(),
        "dispatching request"
    );

    let transforms = config.transform_response.clone();
    match transport.send(config).await {
        Ok(response) => transform_response(response, transforms.as_ref()),
        Err(mut err) => {
            if let Some(response) = err.take_response() {
                err = err.with_response(transform_response(response, transforms.as_ref())?);
            }
            Err(err)
        }
    }
}

fn transform_response(
    response: HttpResponse,
    transforms: Option<&Transformers>,
) -> Result<HttpResponse, HttpError> {
    let (data, response) = response.into_parts();
    let mut headers = response.headers().clone();
    let data = match transform(data, &mut headers, transforms) {
        Ok(data) => data,
        Err(err) => {
            let err = err.with_config(response.config().clone());
            return Err(match response.request() {
                Some(request) => err.with_request(request.clone()),
                None => err,
            });
        }
    };
    Ok(response.with_data(data).with_headers(headers))
}
