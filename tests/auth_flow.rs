//! Identity flows: registration + OTP verification, enumeration-safe login,
//! refresh rotation and revocation.

mod common;

use medassist_api::{
    dto::auth::{LoginOutcome, LoginRequest, RegisterRequest, VerifyOtpRequest},
    services::auth_service,
};

#[tokio::test]
async fn register_verify_and_refresh_rotation() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let email = common::unique_email("jane");
    let phone = common::unique_phone();
    // Raw input with spacing; the service normalizes to E.164.
    let raw_phone = format!("{} {}", &phone[..6], &phone[6..]);
    let last4 = &phone[phone.len() - 4..];

    let registered = auth_service::register(
        &state,
        RegisterRequest {
            name: "Jane".to_string(),
            email: email.to_uppercase(),
            phone: raw_phone,
            password: "securePass123".to_string(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(registered.user.email, email);
    assert_eq!(registered.user.phone, phone);
    assert!(!registered.user.is_verified);
    // The acknowledgement masks the phone.
    assert!(registered.message.contains(&format!("***{last4}")));

    // Duplicate registration with the same phone fails.
    let err = auth_service::register(
        &state,
        RegisterRequest {
            name: "Jane 2".to_string(),
            email: common::unique_email("jane2"),
            phone: phone.clone(),
            password: "securePass123".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.error_code(), "USER_EXISTS");

    // Login before verification re-issues an OTP, no tokens.
    let outcome = auth_service::login(
        &state,
        LoginRequest {
            email_or_phone: email.clone(),
            password: "securePass123".to_string(),
        },
    )
    .await?
    .data
    .unwrap();
    assert!(matches!(
        outcome,
        LoginOutcome::VerificationRequired { verified: false, .. }
    ));

    // The test reads the issued OTP straight from the store.
    let record = state.kv.get_otp(&phone).await?.expect("OTP stored");

    // Wrong digits fail without consuming the record.
    let wrong = if record.otp == "000000" { "111111" } else { "000000" };
    let err = auth_service::verify_otp(
        &state,
        VerifyOtpRequest {
            phone: phone.clone(),
            otp: wrong.to_string(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.error_code(), "OTP_INVALID");

    let verified = auth_service::verify_otp(
        &state,
        VerifyOtpRequest {
            phone: phone.clone(),
            otp: record.otp.clone(),
        },
    )
    .await?
    .data
    .unwrap();
    assert!(verified.user.is_verified);
    let r1 = verified.tokens.refresh_token.clone();

    // A used OTP cannot verify again inside its retention window.
    let err = auth_service::verify_otp(
        &state,
        VerifyOtpRequest {
            phone: phone.clone(),
            otp: record.otp,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.error_code(), "OTP_INVALID");

    // Rotation: r1 -> r2 invalidates r1; r2 still works and yields r3.
    let r2 = auth_service::refresh(&state, &r1).await?.data.unwrap().tokens.refresh_token;
    let err = auth_service::refresh(&state, &r1).await.unwrap_err();
    assert_eq!(err.error_code(), "TOKEN_INVALID");
    let r3 = auth_service::refresh(&state, &r2).await?.data.unwrap().tokens.refresh_token;

    // Logout revokes the latest token; refreshing with it now fails.
    auth_service::logout(&state, Some(&r3)).await?;
    let err = auth_service::refresh(&state, &r3).await.unwrap_err();
    assert_eq!(err.error_code(), "TOKEN_INVALID");

    Ok(())
}

#[tokio::test]
async fn login_failures_are_indistinguishable() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let email = common::unique_email("known");
    common::create_user(&state, &email, &common::unique_phone(), &["customer"], true).await?;

    // Wrong password on a known account.
    let wrong_password = auth_service::login(
        &state,
        LoginRequest {
            email_or_phone: email,
            password: "not-the-password".to_string(),
        },
    )
    .await
    .unwrap_err();

    // Unknown account entirely.
    let unknown_account = auth_service::login(
        &state,
        LoginRequest {
            email_or_phone: common::unique_email("nobody"),
            password: "whatever12345".to_string(),
        },
    )
    .await
    .unwrap_err();

    assert_eq!(wrong_password.error_code(), "INVALID_CREDENTIALS");
    assert_eq!(unknown_account.error_code(), "INVALID_CREDENTIALS");
    assert_eq!(wrong_password.to_string(), unknown_account.to_string());

    Ok(())
}
