use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{gender::Gender, repo_types::Account};
use crate::media::MediaLibrary;

pub const PROFILE_PICTURES: &str = "profile_pictures";

/// Public shape of an account. Has no field for the password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub gender: Gender,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl AccountView {
    pub fn project(account: &Account, profile_picture: Option<String>) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            email: account.email.clone(),
            gender: account.gender,
            bio: account.bio.clone(),
            profile_picture,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Looks the picture URL up now; nothing about it is cached on the account.
pub async fn present(media: &MediaLibrary, account: &Account) -> anyhow::Result<AccountView> {
    let picture = media.url(account.id, PROFILE_PICTURES).await?;
    Ok(AccountView::project(account, picture))
}
