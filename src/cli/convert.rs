use super::session::Session;
use super::ui;
use crate::core::config::AppConfig;
use crate::core::display::{conversion_rows, parse_amount, sanitize_amount};
use crate::core::{CurrencyCode, FetchState, Settings};
use anyhow::Result;

pub const DECIMAL_SEPARATOR: char = '.';

/// Renders the converter screen for `amount` units of the base currency.
pub fn render(state: &FetchState, settings: &Settings, amount: f64) -> String {
    match state {
        FetchState::Loading => ui::style_text("Loading rates...", ui::StyleType::Subtle),
        FetchState::Failed(err) => ui::style_text(&err.user_message(), ui::StyleType::Error),
        FetchState::Loaded(snapshot) if amount > 0.0 => {
            let mut table = ui::new_styled_table();
            table.set_header(vec![
                ui::header_cell("Currency"),
                ui::header_cell("Converted"),
            ]);

            for row in conversion_rows(snapshot, &settings.displayed_currencies, amount) {
                table.add_row(vec![
                    ui::code_cell(row.code.as_str()),
                    ui::format_optional_cell(row.value, "Rate N/A", |v| format!("{v:.2}")),
                ]);
            }

            let mut output = format!(
                "{}\n",
                ui::style_text(
                    &format!(
                        "Conversion Results (Base: {})",
                        settings.base_currency
                    ),
                    ui::StyleType::Title
                )
            );
            output.push_str(&format!(
                "{} {amount:.2} {}\n\n",
                ui::style_text("Amount:", ui::StyleType::Label),
                settings.base_currency
            ));
            output.push_str(&table.to_string());
            output
        }
        _ => ui::style_text(
            "Please enter a valid amount to start converting.",
            ui::StyleType::Subtle,
        ),
    }
}

pub async fn run(config: &AppConfig, input: &str, base: Option<CurrencyCode>) -> Result<()> {
    let sanitized = sanitize_amount(input, DECIMAL_SEPARATOR);
    let amount = parse_amount(&sanitized, DECIMAL_SEPARATOR);

    let mut session = Session::from_config(config)?;
    if let Some(code) = base {
        session.set_base_currency(code).await?;
    }
    session.ensure_loaded().await;

    println!(
        "{}",
        render(&session.store().state(), session.settings(), amount)
    );
    Ok(())
}
