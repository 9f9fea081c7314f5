//! Output formatting utilities for tgctl

use crate::cli::OutputFormat;
use crate::client::{ChatReply, HealthResponse, ReadinessResponse, TransactionLogResponse};
use colored::*;
use serde::Serialize;
use tollgate_core::errors::CoreError;
use tollgate_core::payment::{PaymentOutcome, PaymentRequirements};

/// Pretty-print any serializable value as JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CoreError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CoreError::Internal(format!("Failed to serialize to JSON: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Display a completed, paid chat request
pub fn display_chat(reply: &ChatReply, format: &OutputFormat) -> Result<(), CoreError> {
    match format {
        OutputFormat::Json => print_json(reply),
        OutputFormat::Text => {
            let many = reply.completion.choices().len() > 1;
            for (index, content) in reply.completion.contents().enumerate() {
                if many {
                    println!("{}", format!("[choice {}]", index).dimmed());
                }
                println!("{}", content.unwrap_or(""));
            }
            println!();
            println!("{:<13} {}", "Request ID:".bold(), reply.request_id);
            if let Some(usage) = reply.completion.usage() {
                println!(
                    "{:<13} {} prompt + {} completion = {} tokens",
                    "Usage:".bold(),
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    usage.total_tokens
                );
            }
            display_payment(reply.payment.as_ref());
            Ok(())
        }
    }
}

fn display_payment(payment: Option<&PaymentOutcome>) {
    match payment {
        Some(p) => {
            let status = if p.success { "settled".green() } else { "failed".red() };
            println!("{:<13} {} on {}", "Payment:".bold(), status, p.network);
            println!("{:<13} {}", "Transaction:".bold(), p.transaction_id);
            println!("{:<13} {}", "Payer:".bold(), p.payer_address.as_deref().unwrap_or("-"));
        }
        None => println!("{:<13} {}", "Payment:".bold(), "no decodable receipt".yellow()),
    }
}

/// Display what the server asks to be paid
pub fn display_payment_requirements(reason: &str, requirements: &PaymentRequirements) {
    println!("{} {}", "Payment required:".yellow().bold(), reason);
    println!("{:<10} {} atomic units of {}", "Amount:".bold(), requirements.max_amount_required, requirements.asset);
    println!("{:<10} {}", "Network:".bold(), requirements.network);
    println!("{:<10} {}", "Pay to:".bold(), requirements.pay_to);
    println!("{:<10} {}", "Scheme:".bold(), requirements.scheme);
    println!("{:<10} {}", "Resource:".bold(), requirements.resource);
}

pub fn display_health(health: &HealthResponse, format: &OutputFormat) -> Result<(), CoreError> {
    match format {
        OutputFormat::Json => print_json(health),
        OutputFormat::Text => {
            println!("{}", "✓ Tollgate is healthy".green().bold());
            println!("Status: {}", health.status.green());
            println!("Version: {} ({})", health.version.version, health.version.build);
            println!("Timestamp: {}", health.timestamp);
            Ok(())
        }
    }
}

pub fn display_readiness(readiness: &ReadinessResponse, format: &OutputFormat) -> Result<(), CoreError> {
    match format {
        OutputFormat::Json => print_json(readiness),
        OutputFormat::Text => {
            if readiness.ready {
                println!("{}", "✓ Tollgate is ready".green().bold());
            } else {
                println!("{}", "✗ Tollgate is not ready".red().bold());
            }
            for check in &readiness.checks {
                let mark = if check.ok { "✓".green() } else { "✗".red() };
                match &check.reason {
                    Some(reason) => println!("  {} {:<16} {}", mark, check.name, reason.dimmed()),
                    None => println!("  {} {}", mark, check.name),
                }
            }
            Ok(())
        }
    }
}

pub fn display_transaction_log(entry: &TransactionLogResponse, format: &OutputFormat) -> Result<(), CoreError> {
    match format {
        OutputFormat::Json => print_json(entry),
        OutputFormat::Text => {
            println!("{} {}", "✓ Logged under".green().bold(), entry.request_id);
            println!("{:<13} {}", "Logged at:".bold(), entry.logged_at);
            display_payment(entry.payment.as_ref());
            Ok(())
        }
    }
}
