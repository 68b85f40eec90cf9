//! Shopping assistant ("Makena").

use askama::Template;
use askama_web::WebTemplate;
use axum::{Form, extract::State};
use duka_core::ProductId;
use serde::Deserialize;
use tracing::instrument;

use crate::assistant::product_prompt;
use crate::state::AppState;

/// Longest question forwarded to the model.
const MAX_QUESTION_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
pub struct AssistantForm {
    #[serde(default)]
    pub question: String,
    /// Set when asked from a product page.
    pub product_id: Option<i64>,
}

/// Answer fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/assistant_answer.html")]
pub struct AssistantAnswerTemplate {
    pub question: String,
    pub answer: String,
}

/// Answer a customer question.
///
/// Failures never surface as errors; the customer always gets a reply.
#[instrument(skip(state, form), fields(product_id = ?form.product_id))]
pub async fn ask(State(state): State<AppState>, Form(form): Form<AssistantForm>) -> AssistantAnswerTemplate {
    let question: String = form.question.trim().chars().take(MAX_QUESTION_CHARS).collect();
    if question.is_empty() {
        return AssistantAnswerTemplate {
            question,
            answer: "Ask me anything about our products!".to_string(),
        };
    }

    let Some(assistant) = state.assistant() else {
        return AssistantAnswerTemplate {
            question,
            answer: "The shopping assistant is not available right now.".to_string(),
        };
    };

    let prompt = match form.product_id {
        Some(id) => match state.api().get_product(ProductId::new(id)).await {
            Ok(product) => {
                let summary = product.spec_summary();
                let details = if summary.is_empty() {
                    product.description.clone()
                } else {
                    Some(summary)
                };
                product_prompt(&product.name, details.as_deref(), &question)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Asking without product context");
                question.clone()
            }
        },
        None => question.clone(),
    };

    AssistantAnswerTemplate {
        answer: assistant.answer(&prompt).await,
        question,
    }
}
