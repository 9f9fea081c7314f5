//! Chat command implementation

use crate::cli::ChatArgs;
use crate::client::TollgateClient;
use crate::config::TgctlConfig;
use crate::output;
use colored::*;
use tollgate_core::prelude::*;
use tracing::info;

/// Handle the chat command
pub async fn handle_chat_command(args: ChatArgs, config: &TgctlConfig) -> Result<(), CoreError> {
    let request = build_request(&args, config);
    // Catch obvious mistakes before paying for a round trip
    request.validate()?;

    let request_id = args
        .request_id
        .clone()
        .map(CorrelationId::new)
        .unwrap_or_else(CorrelationId::generate);
    let payment = args.payment.as_deref().or(config.payment.as_deref());

    info!("[{}] sending chat completion for model {}", request_id, request.model);

    let client = TollgateClient::new(config.clone())?;
    match client.chat(&request, &request_id, payment).await {
        Ok(reply) => output::display_chat(&reply, &config.default_format),
        Err(CoreError::Payment(e)) => {
            if let Some(requirements) = e.requirements() {
                output::display_payment_requirements(&e.to_string(), requirements);
            }
            Err(CoreError::Payment(e))
        }
        Err(e) => {
            println!("{}", "✗ Chat completion failed".red().bold());
            Err(e)
        }
    }
}

/// Build the completion request from CLI arguments
pub fn build_request(args: &ChatArgs, config: &TgctlConfig) -> ChatCompletionRequest {
    let mut messages = Vec::new();
    if let Some(system) = &args.system {
        messages.push(ChatMessage::system(system.as_str()));
    }
    messages.push(ChatMessage::user(args.message.as_str()));

    let model = args.model.clone().unwrap_or_else(|| config.default_model.clone());
    let mut request = ChatCompletionRequest::new(model, messages);
    if let Some(max_tokens) = args.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }
    if let Some(temperature) = args.temperature {
        request = request.with_temperature(temperature);
    }
    if let Some(top_p) = args.top_p {
        request = request.with_top_p(top_p);
    }
    request
}
