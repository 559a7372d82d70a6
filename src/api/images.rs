use anyhow::{Context, Result};
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;

use crate::{app_error::AppError, config::ImageHostConfig};

#[derive(Deserialize)]
struct HostedImage {
    url: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    data: HostedImage,
}

/// Uploads one image to the image host and returns the public URL it is
/// served from.
pub async fn upload_image(
    client: &Client,
    config: &ImageHostConfig,
    file_name: String,
    bytes: Vec<u8>,
) -> Result<String> {
    let form = Form::new().part("image", Part::bytes(bytes).file_name(file_name));

    let mut request = client.post(&config.upload_url).multipart(form);
    if let Some(key) = &config.api_key {
        request = request.query(&[("key", key)]);
    }

    let response = request
        .send()
        .await
        .map_err(|_| AppError::ServiceUnreachable("ImageHost".into()))?;

    if !response.status().is_success() {
        tracing::warn!("Image host answered with {}", response.status());
        return Err(AppError::ServiceUnreachable("ImageHost".into()).into());
    }

    let uploaded: UploadResponse = response
        .json()
        .await
        .context("Failed to parse image host response")?;

    Ok(uploaded.data.url)
}
