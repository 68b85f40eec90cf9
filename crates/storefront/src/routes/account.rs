//! Account overview and address book.
//!
//! These routes require authentication. Addresses are stored by the API;
//! checkout picks one of them for delivery.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use duka_api_client::{Address, AddressInput, OrderQuery};
use duka_core::delivery::regions;
use duka_core::{AddressId, MpesaPhone};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::{Flash, push_flash};
use crate::state::AppState;
use crate::views::PageContext;

use super::orders::OrderRow;

const ADDRESSES_PATH: &str = "/account/addresses";

/// Orders shown on the overview.
const RECENT_ORDERS: u32 = 5;

/// Address form fields.
#[derive(Debug, Default, Deserialize)]
pub struct AddressForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub address: String,
    pub additional_info: Option<String>,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub city: String,
    /// Checkbox; present when ticked.
    pub is_default: Option<String>,
}

impl AddressForm {
    /// Check the form and build the API body.
    ///
    /// # Errors
    ///
    /// Returns the first problem as a customer-facing message.
    pub fn validate(&self) -> std::result::Result<AddressInput, String> {
        let required = [
            ("First name", &self.first_name),
            ("Last name", &self.last_name),
            ("Phone number", &self.phone_number),
            ("Address", &self.address),
            ("Region", &self.region),
            ("City", &self.city),
        ];
        if let Some((label, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(format!("{label} is required"));
        }

        MpesaPhone::parse(&self.phone_number).map_err(|e| e.to_string())?;

        let region = self.region.trim();
        if !regions().any(|known| known == region) {
            return Err("Please select a region from the list".to_string());
        }

        Ok(AddressInput {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
            address: self.address.trim().to_string(),
            additional_info: self
                .additional_info
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            region: region.to_string(),
            city: self.city.trim().to_string(),
            is_default: self.is_default.is_some(),
        })
    }
}

/// Region dropdown entry.
#[derive(Clone)]
pub struct RegionOption {
    pub name: &'static str,
    pub selected: bool,
}

fn region_options(selected: &str) -> Vec<RegionOption> {
    regions()
        .map(|name| RegionOption {
            name,
            selected: name == selected,
        })
        .collect()
}

/// Address display data for templates.
#[derive(Clone)]
pub struct AddressView {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub address: String,
    pub additional_info: String,
    pub region: String,
    pub city: String,
    pub is_default: bool,
    pub region_options: Vec<RegionOption>,
}

impl From<&Address> for AddressView {
    fn from(address: &Address) -> Self {
        Self {
            id: address.id.as_i64(),
            first_name: address.first_name.clone(),
            last_name: address.last_name.clone(),
            phone_number: address.phone_number.clone(),
            address: address.address.clone(),
            additional_info: address.additional_info.clone().unwrap_or_default(),
            region: address.region.clone(),
            city: address.city.clone(),
            is_default: address.is_default,
            region_options: region_options(&address.region),
        }
    }
}

/// Address book template.
#[derive(Template, WebTemplate)]
#[template(path = "account/addresses.html")]
pub struct AddressesTemplate {
    pub ctx: PageContext,
    pub addresses: Vec<AddressView>,
    pub regions: Vec<RegionOption>,
}

/// Account overview template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountTemplate {
    pub ctx: PageContext,
    pub username: String,
    pub email: String,
    pub default_address: Option<AddressView>,
    pub recent_orders: Vec<OrderRow>,
}

/// Profile, default address and latest orders.
#[instrument(skip(state, ctx, customer))]
pub async fn overview(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
) -> Result<AccountTemplate> {
    let query = OrderQuery::page(1, RECENT_ORDERS, None);
    let (addresses, orders) = tokio::join!(
        state.api().list_addresses(&customer.token),
        state.api().my_orders(&customer.token, &query),
    );
    let addresses = addresses?;
    let orders = orders?;

    Ok(AccountTemplate {
        ctx,
        username: customer.username,
        email: customer.email,
        default_address: addresses
            .iter()
            .find(|a| a.is_default)
            .or_else(|| addresses.first())
            .map(AddressView::from),
        recent_orders: orders.items.iter().map(OrderRow::from).collect(),
    })
}

/// Display the address book.
#[instrument(skip(state, ctx, customer))]
pub async fn addresses(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
) -> Result<AddressesTemplate> {
    let addresses = state.api().list_addresses(&customer.token).await?;
    Ok(AddressesTemplate {
        ctx,
        addresses: addresses.iter().map(AddressView::from).collect(),
        regions: region_options(""),
    })
}

/// Add an address.
#[instrument(skip(state, session, customer, form))]
pub async fn create_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Form(form): Form<AddressForm>,
) -> Result<Response> {
    let flash = match form.validate() {
        Ok(input) => {
            state.api().create_address(&customer.token, &input).await?;
            Flash::success("Address added")
        }
        Err(message) => Flash::error(message),
    };
    push_flash(&session, flash).await;
    Ok(Redirect::to(ADDRESSES_PATH).into_response())
}

/// Edit an address.
#[instrument(skip(state, session, customer, form))]
pub async fn update_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<i64>,
    Form(form): Form<AddressForm>,
) -> Result<Response> {
    let flash = match form.validate() {
        Ok(input) => {
            state
                .api()
                .update_address(&customer.token, AddressId::new(id), &input)
                .await?;
            Flash::success("Address updated")
        }
        Err(message) => Flash::error(message),
    };
    push_flash(&session, flash).await;
    Ok(Redirect::to(ADDRESSES_PATH).into_response())
}

/// Remove an address.
#[instrument(skip(state, session, customer))]
pub async fn delete_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<i64>,
) -> Result<Response> {
    state
        .api()
        .delete_address(&customer.token, AddressId::new(id))
        .await?;
    push_flash(&session, Flash::success("Address removed")).await;
    Ok(Redirect::to(ADDRESSES_PATH).into_response())
}

/// Make an address the default for checkout.
#[instrument(skip(state, session, customer))]
pub async fn set_default_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<i64>,
) -> Result<Response> {
    let address_id = AddressId::new(id);
    let addresses = state.api().list_addresses(&customer.token).await?;
    let address = addresses
        .iter()
        .find(|a| a.id == address_id)
        .ok_or_else(|| AppError::NotFound(format!("address {id}")))?;

    let mut input = address.to_input();
    input.is_default = true;
    state
        .api()
        .update_address(&customer.token, address_id, &input)
        .await?;

    push_flash(&session, Flash::success("Default address updated")).await;
    Ok(Redirect::to(ADDRESSES_PATH).into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> AddressForm {
        AddressForm {
            first_name: " Achieng ".to_string(),
            last_name: "Otieno".to_string(),
            phone_number: "0712345678".to_string(),
            address: "Oginga Odinga St".to_string(),
            additional_info: Some("  ".to_string()),
            region: "Nyanza".to_string(),
            city: "Kisumu".to_string(),
            is_default: Some("on".to_string()),
        }
    }

    #[test]
    fn test_validate_trims_and_reads_checkbox() {
        let input = form().validate().unwrap();
        assert_eq!(input.first_name, "Achieng");
        assert_eq!(input.additional_info, None);
        assert!(input.is_default);
    }

    #[test]
    fn test_validate_reports_first_missing_field() {
        let missing = AddressForm {
            last_name: String::new(),
            city: String::new(),
            ..form()
        };
        assert_eq!(missing.validate().unwrap_err(), "Last name is required");
    }

    #[test]
    fn test_validate_rejects_bad_phone_and_region() {
        let bad_phone = AddressForm {
            phone_number: "12345".to_string(),
            ..form()
        };
        assert!(bad_phone.validate().unwrap_err().contains("Kenyan phone number"));

        let bad_region = AddressForm {
            region: "Atlantis".to_string(),
            ..form()
        };
        assert_eq!(
            bad_region.validate().unwrap_err(),
            "Please select a region from the list"
        );
    }
}
