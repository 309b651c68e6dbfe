use std::env;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MATOMO_URL: &str = "https://stats.data.gouv.fr";
const TRACK_TIMEOUT: Duration = Duration::from_millis(1500);

/// Best-effort usage tracker.
///
/// Tracking is disabled entirely unless `MATOMO_SITE_ID` is set. Pings
/// are spawned in the background and every failure is swallowed after
/// logging; a tracking outage must never delay or break a tool
/// response.
#[derive(Clone)]
pub struct MatomoTracker {
    site_id: Option<String>,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl MatomoTracker {
    pub fn from_env() -> Self {
        Self {
            site_id: env::var("MATOMO_SITE_ID").ok().filter(|v| !v.is_empty()),
            auth_token: env::var("MATOMO_AUTH").ok(),
            client: reqwest::Client::new(),
        }
    }

    /// Fire a tracking ping for one inbound request, without waiting
    /// for it.
    pub fn spawn_track(&self, method: &str, site_base: &str) {
        let Some(site_id) = self.site_id.clone() else {
            return;
        };
        let auth_token = self.auth_token.clone();
        let client = self.client.clone();
        let action_name = format!("MCP Request: {method}");
        let url = format!("{site_base}mcp");

        tokio::spawn(async move {
            if let Err(err) = track(&client, &site_id, auth_token.as_deref(), &url, &action_name).await
            {
                tracing::error!("Matomo tracking failed: {err}");
            }
        });
    }
}

async fn track(
    client: &reqwest::Client,
    site_id: &str,
    auth_token: Option<&str>,
    url: &str,
    action_name: &str,
) -> Result<(), reqwest::Error> {
    let rand = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();

    let mut payload: Vec<(&str, String)> = vec![
        ("idsite", site_id.to_string()),
        ("rec", "1".to_string()),
        ("url", url.to_string()),
        ("action_name", action_name.to_string()),
        ("rand", rand.to_string()),
    ];
    if let Some(token) = auth_token {
        payload.push(("token_auth", token.to_string()));
    }

    client
        .post(format!("{MATOMO_URL}/matomo.php"))
        .form(&payload)
        .timeout(TRACK_TIMEOUT)
        .send()
        .await?;
    Ok(())
}
