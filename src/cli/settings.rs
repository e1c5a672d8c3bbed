use super::session::Session;
use super::{rates, ui};
use crate::core::config::AppConfig;
use crate::core::{AVAILABLE_CURRENCIES, CurrencyCode, Settings};
use anyhow::Result;
use comfy_table::{Cell, CellAlignment, Color};
use tracing::info;

/// Changes requested from the settings screen.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsAction {
    Show,
    SetBase(CurrencyCode),
    SetDisplayed(Vec<CurrencyCode>),
    Toggle(CurrencyCode),
}

/// Renders the base currency and the display toggle for every available
/// currency. Displayed codes outside the catalogue are listed as well.
pub fn render(settings: &Settings) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Displayed"),
    ]);

    let mut codes: Vec<&str> = AVAILABLE_CURRENCIES.to_vec();
    codes.extend(
        settings
            .displayed_currencies
            .iter()
            .map(CurrencyCode::as_str)
            .filter(|code| !AVAILABLE_CURRENCIES.contains(code)),
    );

    for code in codes {
        let displayed = settings
            .displayed_currencies
            .iter()
            .any(|c| c.as_str() == code);
        let toggle = if displayed {
            Cell::new("on").fg(Color::Green)
        } else {
            Cell::new("off").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            ui::code_cell(code),
            toggle.set_alignment(CellAlignment::Center),
        ]);
    }

    let order = settings
        .displayed_currencies
        .iter()
        .map(CurrencyCode::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{} {}\n{} {}\n\n{}",
        ui::style_text("Base Currency:", ui::StyleType::Label),
        settings.base_currency,
        ui::style_text("Display order:", ui::StyleType::Label),
        if order.is_empty() { "(none)".to_string() } else { order },
        table
    )
}

/// Applies a display-list change and persists it. Returns the new settings.
fn update_displayed(config: &AppConfig, action: SettingsAction) -> Result<Settings> {
    let path = config.settings_path()?;
    let mut settings = Settings::load_from_path(&path)?;

    match action {
        SettingsAction::SetDisplayed(codes) => settings.set_displayed(codes),
        SettingsAction::Toggle(code) => {
            let now_displayed = settings.toggle_displayed(code.clone());
            info!(%code, now_displayed, "Toggled displayed currency");
        }
        SettingsAction::Show | SettingsAction::SetBase(_) => {}
    }

    settings.save_to_path(&path)?;
    Ok(settings)
}

pub async fn run(config: &AppConfig, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {
            let settings = Settings::load_from_path(config.settings_path()?)?;
            println!("{}", render(&settings));
        }
        SettingsAction::SetBase(code) => {
            let mut session = Session::from_config(config)?;
            session.set_base_currency(code).await?;
            session.ensure_loaded().await;
            println!("{}", render(session.settings()));
            ui::print_separator();
            println!(
                "{}",
                rates::render(&session.store().state(), session.settings())
            );
        }
        action @ (SettingsAction::SetDisplayed(_) | SettingsAction::Toggle(_)) => {
            let settings = update_displayed(config, action)?;
            println!("{}", render(&settings));
        }
    }
    Ok(())
}
