use lazy_static::lazy_static;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::*,
    repo::EmailTaken,
    repo_types::{Account, NewAccount},
    validation::{self, FieldErrors, Presence, MAX_STRING_LEN},
    view::{present, AccountView, PROFILE_PICTURES},
};
use crate::{
    auth::password::{hash_password, verify_password},
    errors::AppError,
    state::AppState,
};

const EMAIL_TAKEN: &str = "The email has already been taken.";

lazy_static! {
    /// Checked against on unknown emails so both login failures cost one
    /// argon2 verification.
    static ref DECOY_HASH: Option<String> = hash_password("decoy-password").ok();
}

async fn ensure_email_free(
    st: &AppState,
    errors: &mut FieldErrors,
    email: &str,
    owner: Option<Uuid>,
) -> anyhow::Result<()> {
    if st.accounts.exists_by_email_excluding(email, owner).await? {
        errors.add(EMAIL, EMAIL_TAKEN);
    }
    Ok(())
}

fn rejected(errors: FieldErrors) -> AppError {
    warn!(fields = ?errors, "validation failed");
    AppError::Validation(errors)
}

/// Maps a lost uniqueness race on write to the same error a pre-check gives.
fn write_error(e: anyhow::Error) -> AppError {
    if e.is::<EmailTaken>() {
        let mut errors = FieldErrors::default();
        errors.add(EMAIL, EMAIL_TAKEN);
        rejected(errors)
    } else {
        AppError::Internal(e)
    }
}

#[instrument(skip(st, form))]
pub async fn register(st: &AppState, form: &AccountForm) -> Result<AuthPayload, AppError> {
    let mut errors = FieldErrors::default();
    let name = validation::string(
        &mut errors,
        NAME,
        form.value(NAME),
        Presence::Required,
        Some(MAX_STRING_LEN),
    );
    let email = validation::email(
        &mut errors,
        EMAIL,
        form.value(EMAIL),
        Presence::Required,
        Some(MAX_STRING_LEN),
    );
    let password = validation::password(&mut errors, PASSWORD, form.value(PASSWORD), Presence::Required);
    let gender = validation::gender(&mut errors, GENDER, form.value(GENDER), Presence::Required);
    let bio = validation::string(&mut errors, BIO, form.value(BIO), Presence::Nullable, None);
    let picture = validation::picture(
        &mut errors,
        PROFILE_PICTURE,
        form.file(PROFILE_PICTURE),
        form.value(PROFILE_PICTURE),
    );
    if let Some(email) = &email {
        ensure_email_free(st, &mut errors, email, None).await?;
    }

    let (Some(name), Some(email), Some(password), Some(gender), true) =
        (name, email, password, gender, errors.is_empty())
    else {
        return Err(rejected(errors));
    };

    let password_hash = hash_password(&password)?;
    let account = st
        .accounts
        .insert(NewAccount {
            name,
            email,
            password_hash,
            gender,
            bio,
        })
        .await
        .map_err(write_error)?;

    if let Some(picture) = picture {
        if let Err(e) = st.media.store(account.id, PROFILE_PICTURES, picture).await {
            // free the email again so the client can retry
            if let Err(cleanup) = st.accounts.delete(account.id).await {
                error!(error = ?cleanup, account_id = %account.id, "could not undo registration");
            }
            return Err(e.into());
        }
    }

    let token = st.tokens.issue(account.id).await?;
    let user = present(&st.media, &account).await?;
    info!(account_id = %account.id, email = %account.email, "account registered");
    Ok(AuthPayload { user, token })
}

#[instrument(skip(st, form))]
pub async fn login(st: &AppState, form: &AccountForm) -> Result<AuthPayload, AppError> {
    let mut errors = FieldErrors::default();
    let email = validation::email(&mut errors, EMAIL, form.value(EMAIL), Presence::Required, None);
    let password = validation::string(&mut errors, PASSWORD, form.value(PASSWORD), Presence::Required, None);
    let (Some(email), Some(password), true) = (email, password, errors.is_empty()) else {
        return Err(rejected(errors));
    };

    let Some(account) = st.accounts.find_by_email(&email).await? else {
        if let Some(decoy) = DECOY_HASH.as_deref() {
            verify_password(&password, decoy)?;
        }
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };
    if !verify_password(&password, &account.password_hash)? {
        warn!(account_id = %account.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = st.tokens.issue(account.id).await?;
    let user = present(&st.media, &account).await?;
    info!(account_id = %account.id, "account logged in");
    Ok(AuthPayload { user, token })
}

pub async fn show(st: &AppState, account: &Account) -> Result<AccountView, AppError> {
    Ok(present(&st.media, account).await?)
}

/// Applies whichever fields the form carries. Nothing is written unless every
/// supplied field is valid, and the picture is only swapped once the row
/// write has gone through.
#[instrument(skip(st, account, form), fields(account_id = %account.id))]
pub async fn update_profile(
    st: &AppState,
    account: &Account,
    form: &AccountForm,
) -> Result<AccountView, AppError> {
    let mut errors = FieldErrors::default();
    let name = validation::string(
        &mut errors,
        NAME,
        form.value(NAME),
        Presence::Sometimes,
        Some(MAX_STRING_LEN),
    );
    let email = validation::email(
        &mut errors,
        EMAIL,
        form.value(EMAIL),
        Presence::Sometimes,
        Some(MAX_STRING_LEN),
    );
    let gender = validation::gender(&mut errors, GENDER, form.value(GENDER), Presence::Sometimes);
    let password = validation::password(&mut errors, PASSWORD, form.value(PASSWORD), Presence::Sometimes);
    validation::confirmed(
        &mut errors,
        PASSWORD,
        password.as_deref(),
        form.value(PASSWORD_CONFIRMATION),
    );
    let bio = if form.has(BIO) {
        Some(validation::string(&mut errors, BIO, form.value(BIO), Presence::Nullable, None))
    } else {
        None
    };
    let picture = validation::picture(
        &mut errors,
        PROFILE_PICTURE,
        form.file(PROFILE_PICTURE),
        form.value(PROFILE_PICTURE),
    );
    if let Some(email) = &email {
        ensure_email_free(st, &mut errors, email, Some(account.id)).await?;
    }
    if !errors.is_empty() {
        return Err(rejected(errors));
    }

    let password_hash = password.as_deref().map(hash_password).transpose()?;

    let mut changed = account.clone();
    if let Some(name) = name {
        changed.name = name;
    }
    if let Some(email) = email {
        changed.email = email;
    }
    if let Some(gender) = gender {
        changed.gender = gender;
    }
    if let Some(bio) = bio {
        changed.bio = bio;
    }
    if let Some(hash) = password_hash {
        changed.password_hash = hash;
    }
    let saved = st.accounts.update(&changed).await.map_err(write_error)?;

    if let Some(picture) = picture {
        st.media.clear(account.id, PROFILE_PICTURES).await?;
        st.media.store(account.id, PROFILE_PICTURES, picture).await?;
    }

    info!("profile updated");
    Ok(present(&st.media, &saved).await?)
}

#[instrument(skip(st, account), fields(account_id = %account.id))]
pub async fn delete_account(st: &AppState, account: &Account) -> Result<(), AppError> {
    st.media.clear(account.id, PROFILE_PICTURES).await?;
    let revoked = st.tokens.revoke_all(account.id).await?;
    st.accounts.delete(account.id).await?;
    info!(revoked_tokens = revoked, "account deleted");
    Ok(())
}

/// Revokes only the token the caller authenticated with.
#[instrument(skip(st))]
pub async fn logout(st: &AppState, token_id: Uuid) -> Result<(), AppError> {
    st.tokens.revoke(token_id).await?;
    info!("logged out");
    Ok(())
}
