use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Canal de sortie des alertes escaladées. Best-effort uniquement : un échec
/// de livraison ne doit jamais toucher l'état des alertes ni le cycle de scan.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send_email(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
        severity: &str,
    ) -> Result<(), DeliveryError>;

    async fn send_sms(
        &self,
        recipients: &[String],
        message: &str,
        severity: &str,
    ) -> Result<(), DeliveryError>;
}

/// Passerelle HTTP : POST JSON vers les relais configurés (relai SMTP
/// et passerelle SMS type Twilio), comme les endpoints
/// /api/notifications/{email,sms} du déploiement d'origine.
pub struct HttpGateway {
    client: reqwest::Client,
    email_endpoint: Option<String>,
    sms_endpoint: Option<String>,
}

impl HttpGateway {
    pub fn new(email_endpoint: Option<String>, sms_endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            email_endpoint,
            sms_endpoint,
        }
    }

    async fn post(&self, endpoint: &str, payload: serde_json::Value) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DeliveryError(format!(
                "relay returned {}",
                response.status()
            )));
        }
        debug!("[notify] delivered via {endpoint}");
        Ok(())
    }
}

#[async_trait]
impl NotificationGateway for HttpGateway {
    async fn send_email(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
        severity: &str,
    ) -> Result<(), DeliveryError> {
        let Some(endpoint) = &self.email_endpoint else {
            return Err(DeliveryError("no email relay configured".into()));
        };
        self.post(
            endpoint,
            json!({
                "to": recipients,
                "subject": subject,
                "body": body,
                "severity": severity,
            }),
        )
        .await
    }

    async fn send_sms(
        &self,
        recipients: &[String],
        message: &str,
        severity: &str,
    ) -> Result<(), DeliveryError> {
        let Some(endpoint) = &self.sms_endpoint else {
            return Err(DeliveryError("no sms relay configured".into()));
        };
        self.post(
            endpoint,
            json!({
                "to": recipients,
                "message": message,
                "severity": severity,
            }),
        )
        .await
    }
}
