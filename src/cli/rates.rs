use super::session::Session;
use super::ui;
use crate::core::config::AppConfig;
use crate::core::display::{format_update_time, rate_rows};
use crate::core::{CurrencyCode, FetchState, Settings};
use anyhow::Result;

/// Renders the rates screen for the given state.
pub fn render(state: &FetchState, settings: &Settings) -> String {
    match state {
        FetchState::Loading => ui::style_text("Fetching rates...", ui::StyleType::Subtle),
        FetchState::Failed(err) => ui::style_text(&err.user_message(), ui::StyleType::Error),
        FetchState::Idle => ui::style_text(
            "No exchange rates data available.",
            ui::StyleType::Subtle,
        ),
        FetchState::Loaded(snapshot) => {
            let mut table = ui::new_styled_table();
            table.set_header(vec![ui::header_cell("Currency"), ui::header_cell("Rate")]);

            for row in rate_rows(snapshot, &settings.displayed_currencies) {
                table.add_row(vec![
                    ui::code_cell(row.code.as_str()),
                    ui::format_optional_cell(row.value, "N/A", |rate| format!("{rate:.4}")),
                ]);
            }

            let mut output = format!(
                "Base Currency: {}\n",
                ui::style_text(&snapshot.base_code, ui::StyleType::Title)
            );
            output.push_str(&ui::style_text(
                &format!(
                    "Last Updated: {}",
                    format_update_time(&snapshot.last_updated_utc)
                ),
                ui::StyleType::Subtle,
            ));
            output.push_str("\n\nConversion Rates\n");
            output.push_str(&table.to_string());
            output
        }
    }
}

pub async fn run(config: &AppConfig, base: Option<CurrencyCode>) -> Result<()> {
    let mut session = Session::from_config(config)?;
    if let Some(code) = base {
        session.set_base_currency(code).await?;
    }
    session.ensure_loaded().await;

    println!("{}", render(&session.store().state(), session.settings()));
    Ok(())
}
