//! Account and listing endpoints

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::client::{ApiClient, RequestBody};
use crate::Result;
use crate::auth::AccessToken;
use crate::error::Error;
use crate::listing::{Attachment, ListingSubmission};

/// Response of `GET /application/users/me`
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub user_id: u64,
    #[serde(default)]
    pub shop_id: Option<u64>,
}

impl UserInfo {
    /// The account's shop, treating a zero id as "no shop"
    pub fn shop(&self) -> Option<u64> {
        self.shop_id.filter(|id| *id != 0)
    }
}

/// Response of the create-listing call
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedListing {
    pub listing_id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub state: String,
}

/// Create-listing request body
#[derive(Debug, Serialize)]
struct CreateListingRequest<'a> {
    title: &'a str,
    description: &'a str,
    quantity: u32,
    price: f64,
    who_made: &'a str,
    when_made: &'a str,
    taxonomy_id: u64,
    shipping_profile_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shop_section_id: Option<u64>,
    is_supply: bool,
    #[serde(rename = "type")]
    listing_type: &'a str,
    state: &'a str,
    tags: &'a [String],
    sku: [&'a str; 1],
    primary_color_id: Option<u64>,
    secondary_color_id: Option<u64>,
    occasion_id: Option<u64>,
    holiday_id: Option<u64>,
    is_personalizable: bool,
}

impl ApiClient {
    /// Fetch the authenticated account
    pub async fn get_me(&self, token: &AccessToken) -> Result<UserInfo> {
        self.call("/application/users/me", Method::GET, RequestBody::Empty, token)
            .await?
            .ok_or_else(|| Error::MalformedResponse("empty account response".to_string()))
    }

    /// Create a draft digital listing in a shop
    pub async fn create_listing(
        &self,
        shop_id: u64,
        submission: &ListingSubmission,
        token: &AccessToken,
    ) -> Result<CreatedListing> {
        let defaults = &self.listing_defaults;
        let request = CreateListingRequest {
            title: &submission.title,
            description: &submission.description,
            quantity: defaults.quantity,
            price: defaults.price,
            who_made: &defaults.who_made,
            when_made: &defaults.when_made,
            taxonomy_id: defaults.taxonomy_id,
            shipping_profile_id: None,
            shop_section_id: defaults.shop_section_id,
            is_supply: false,
            listing_type: "digital",
            state: "draft",
            tags: &submission.tags,
            sku: [submission.sku.as_str()],
            primary_color_id: submission.primary_color_id,
            secondary_color_id: submission.secondary_color_id,
            occasion_id: None,
            holiday_id: submission.holiday_id,
            is_personalizable: false,
        };

        let body = RequestBody::Json(serde_json::to_value(&request)?);
        self.call(&format!("/application/shops/{}/listings", shop_id), Method::POST, body, token)
            .await?
            .ok_or_else(|| Error::MalformedResponse("empty create-listing response".to_string()))
    }

    /// Attach an image; `rank` sets its display position
    pub async fn upload_image(
        &self,
        listing_id: u64,
        image: &Attachment,
        rank: u8,
        token: &AccessToken,
    ) -> Result<()> {
        let form = Form::new()
            .part("image", attachment_part(image)?)
            .text("rank", rank.to_string());

        self.call::<Value>(
            &format!("/application/listings/{}/images", listing_id),
            Method::POST,
            RequestBody::Multipart(form),
            token,
        )
        .await?;
        Ok(())
    }

    /// Attach the downloadable file, named after the original file
    pub async fn upload_file(
        &self,
        listing_id: u64,
        file: &Attachment,
        token: &AccessToken,
    ) -> Result<()> {
        let form = Form::new()
            .part("file", attachment_part(file)?)
            .text("name", file.file_name.clone());

        self.call::<Value>(
            &format!("/application/listings/{}/files", listing_id),
            Method::POST,
            RequestBody::Multipart(form),
            token,
        )
        .await?;
        Ok(())
    }
}

fn attachment_part(attachment: &Attachment) -> Result<Part> {
    let part = Part::bytes(attachment.bytes.clone())
        .file_name(attachment.file_name.clone())
        .mime_str(&attachment.mime_type)?;
    Ok(part)
}
