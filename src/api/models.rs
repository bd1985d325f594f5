use crate::api::{ModelInfo, ModelsResponse};
use crate::utils::url::construct_api_url;

pub async fn fetch_models(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
) -> Result<ModelsResponse, Box<dyn std::error::Error>> {
    let models_url = construct_api_url(base_url, "models");
    let response = client
        .get(models_url)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {api_key}"))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(format!("API request failed with status {status}: {error_text}").into());
    }

    let models_response = response.json::<ModelsResponse>().await?;
    Ok(models_response)
}

/// Newest first when the endpoint reports creation times, otherwise by id.
/// Some endpoints prefix ids with `models/`; that prefix is stripped.
pub fn normalize_models(models: &mut Vec<ModelInfo>) {
    for model in models.iter_mut() {
        if let Some(stripped) = model.id.strip_prefix("models/") {
            model.id = stripped.to_string();
        }
    }
    models.sort_by(|a, b| match (a.created, b.created) {
        (Some(a_created), Some(b_created)) => b_created.cmp(&a_created).then(a.id.cmp(&b.id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
    models.dedup_by(|a, b| a.id == b.id);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str, created: Option<u64>) -> ModelInfo {
        ModelInfo {
            id: id.to_string(),
            created,
            owned_by: None,
            display_name: None,
        }
    }

    #[test]
    fn normalize_strips_prefix_and_orders() {
        let mut models = vec![
            model("models/gemini-b", None),
            model("gpt-old", Some(10)),
            model("gemini-a", None),
            model("gpt-new", Some(20)),
        ];
        normalize_models(&mut models);
        let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["gpt-new", "gpt-old", "gemini-a", "gemini-b"]);
    }
}
