//! Onboarding webhook: submits the laundromat form and receives the
//! provisioned instance plus its pairing image.

use serde::Serialize;

use splia_core::{PairingImage, SessionHandle};

use crate::error::{ClientError, check_status};

#[derive(Debug, Clone, Serialize)]
pub struct OnboardingForm {
    #[serde(rename = "email_usuario")]
    pub email: String,
    #[serde(rename = "nome_lavanderia")]
    pub laundromat_name: String,
    #[serde(rename = "telefone", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "endereco", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub image: PairingImage,
    pub instance: Option<SessionHandle>,
}

pub async fn submit_onboarding(
    http: &reqwest::Client,
    webhook_url: &str,
    form: &OnboardingForm,
) -> Result<Provisioned, ClientError> {
    let response = http
        .post(webhook_url)
        .json(form)
        .send()
        .await
        .map_err(|e| ClientError::request(webhook_url, e))?;
    let body: serde_json::Value = check_status(webhook_url, response)
        .await?
        .json()
        .await
        .map_err(|e| ClientError::decode(webhook_url, e.to_string()))?;
    parse_provisioned(&body)
        .ok_or_else(|| ClientError::decode(webhook_url, "no pairing image in response"))
}

/// Workflow responses come in a few shapes; some wrap the object in an array.
pub(crate) fn parse_provisioned(body: &serde_json::Value) -> Option<Provisioned> {
    let body = match body.as_array() {
        Some(items) => items.first()?,
        None => body,
    };
    let raw = body["base64"]
        .as_str()
        .or_else(|| body["qrcode"]["base64"].as_str())
        .or_else(|| body["qr_code"].as_str())?;
    let image = PairingImage::new(raw).ok()?;
    let instance = body["instance_name"]
        .as_str()
        .or_else(|| body["instance"]["instanceName"].as_str())
        .and_then(SessionHandle::new);
    Some(Provisioned { image, instance })
}
