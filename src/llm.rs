use crate::error::{Result, SearchError};
use crate::execution::SqlConverter;
use crate::status_terms::status_context;
use async_trait::async_trait;
use tracing::{info, warn};

/// Marker the model is told to return when it cannot produce SQL.
pub const UNANSWERABLE: &str = "CANNOT_ANSWER";

const SYSTEM_PROMPT: &str = "You translate questions about a recruitment and timesheet database \
into a single Microsoft SQL Server SELECT statement. Reply with the SQL only, no prose and no \
markdown.";

const SCHEMA_GUIDE: &str = r#"Rules:
- Produce exactly one SELECT statement. Never modify data. No semicolons, no comments.
- Use schema-qualified tables: dbo.Candidates, dbo.Timesheets, dbo.Bookings, dbo.Clients, dbo.Requirements.
- Use TOP n instead of LIMIT.
- For partial name matches use Column LIKE '%value%'.
- When a value must come from the user, reference it as a positional parameter @p0, @p1, ...
- Status columns are coded integers: Timesheets.StatusId, Bookings.WorkStatusId,
  Clients.ClientStatusId, Requirements.CVWorkflowStatusId.
- If the question cannot be answered from this schema, reply with CANNOT_ANSWER."#;

#[derive(Clone)]
pub struct LlmClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    /// User prompt for a question, including any recognized status context.
    pub fn build_prompt(&self, question: &str) -> String {
        let mut prompt = String::from(SCHEMA_GUIDE);
        if let Some(context) = status_context(question) {
            prompt.push_str("\n\n");
            prompt.push_str(&context);
        }
        prompt.push_str(&format!("\n\nQuestion: {}", question));
        prompt
    }

    pub async fn call_llm(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.0,
            "max_tokens": 800,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Conversion(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SearchError::Conversion(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SearchError::Conversion(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(error) = response_json.get("error") {
            return Err(SearchError::Conversion(format!("LLM API error: {}", error)));
        }

        let choice = response_json
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| SearchError::Conversion("No choices in LLM response".to_string()))?;

        match choice.get("finish_reason").and_then(|r| r.as_str()) {
            Some("content_filter") => {
                return Err(SearchError::Conversion(
                    "LLM response was filtered by content policy".to_string(),
                ));
            }
            Some("length") => warn!("LLM response was truncated due to length limit"),
            _ => {}
        }

        let content = choice["message"]["content"]
            .as_str()
            .ok_or_else(|| SearchError::Conversion("No content in LLM response".to_string()))?;

        Ok(content.to_string())
    }
}

/// Pull the SQL statement out of a model reply.
pub fn extract_sql(reply: &str) -> Result<String> {
    let mut text = reply.trim();

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let after = after
            .strip_prefix("sql")
            .or_else(|| after.strip_prefix("SQL"))
            .unwrap_or(after);
        text = match after.find("```") {
            Some(end) => &after[..end],
            None => after,
        }
        .trim();
    }

    let text = text.strip_suffix(';').unwrap_or(text).trim();

    if text.is_empty() {
        return Err(SearchError::Conversion("LLM returned no SQL".to_string()));
    }
    if text.eq_ignore_ascii_case(UNANSWERABLE) {
        return Err(SearchError::Conversion(
            "The question could not be mapped to the available data".to_string(),
        ));
    }
    Ok(text.to_string())
}

#[async_trait]
impl SqlConverter for LlmClient {
    async fn convert(&self, natural_language: &str) -> Result<String> {
        let prompt = self.build_prompt(natural_language);
        let reply = self.call_llm(&prompt).await?;
        let sql = extract_sql(&reply)?;
        info!(query = natural_language, %sql, "Converted natural language to SQL");
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> LlmClient {
        LlmClient::new("test".to_string(), "gpt-4o-mini".to_string(), "http://localhost:9".to_string())
    }

    #[test]
    fn test_extract_sql_from_fenced_reply() {
        let reply = "Here you go:\n```sql\nSELECT TOP 10 Id FROM dbo.Candidates;\n```";
        assert_eq!(extract_sql(reply).unwrap(), "SELECT TOP 10 Id FROM dbo.Candidates");
    }

    #[test]
    fn test_extract_sql_plain_reply() {
        assert_eq!(
            extract_sql("  SELECT Id FROM dbo.Clients  ").unwrap(),
            "SELECT Id FROM dbo.Clients"
        );
    }

    #[test]
    fn test_extract_sql_failures() {
        assert!(matches!(extract_sql("   "), Err(SearchError::Conversion(_))));
        assert!(matches!(extract_sql("CANNOT_ANSWER"), Err(SearchError::Conversion(_))));
    }

    #[test]
    fn test_prompt_carries_status_context() {
        let prompt = client().build_prompt("timesheets submitted last week");
        assert!(prompt.contains("StatusId = 5"));
        assert!(prompt.ends_with("Question: timesheets submitted last week"));

        let plain = client().build_prompt("count all candidates");
        assert!(!plain.contains("status terms were detected"));
    }
}
