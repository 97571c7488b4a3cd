//! HTTP, email and SMS actions.
//!
//! Nothing leaves the process: each action rolls against a success rate so
//! previews exercise both the `success` and the `error` branch.

use chrono::Utc;
use rand::Rng;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::kind::{HttpRequestConfig, SendEmailConfig, SendSmsConfig, HANDLE_ERROR, HANDLE_SUCCESS};
use crate::NodeOutcome;

pub fn http_request<R: Rng + ?Sized>(
    config: &HttpRequestConfig,
    input: &Value,
    success_rate: f64,
    rng: &mut R,
) -> NodeOutcome {
    if roll(rng, success_rate) {
        NodeOutcome::fired(
            json!({
                "status": 200,
                "url": config.url,
                "method": config.method,
                "data": {
                    "ok": true,
                    "echo": config.body.clone().unwrap_or_else(|| input.clone()),
                },
                "timestamp": Utc::now().to_rfc3339(),
            }),
            HANDLE_SUCCESS,
        )
    } else {
        let message = format!("Simulated HTTP failure: {} {}", config.method, config.url);
        NodeOutcome::failed(
            Some(json!({ "status": 500, "url": config.url, "error": message })),
            message,
            Some(HANDLE_ERROR),
        )
    }
}

pub fn send_email<R: Rng + ?Sized>(
    config: &SendEmailConfig,
    success_rate: f64,
    rng: &mut R,
) -> NodeOutcome {
    if roll(rng, success_rate) {
        NodeOutcome::fired(
            json!({
                "sent": true,
                "message_id": Uuid::new_v4().to_string(),
                "to": config.to,
                "subject": config.subject,
                "timestamp": Utc::now().to_rfc3339(),
            }),
            HANDLE_SUCCESS,
        )
    } else {
        let message = format!("Simulated email delivery failure to '{}'", config.to);
        NodeOutcome::failed(
            Some(json!({ "sent": false, "to": config.to, "error": message })),
            message,
            Some(HANDLE_ERROR),
        )
    }
}

pub fn send_sms<R: Rng + ?Sized>(
    config: &SendSmsConfig,
    success_rate: f64,
    rng: &mut R,
) -> NodeOutcome {
    if roll(rng, success_rate) {
        NodeOutcome::fired(
            json!({
                "sent": true,
                "message_id": Uuid::new_v4().to_string(),
                "to": config.to,
                "length": config.message.chars().count(),
                "timestamp": Utc::now().to_rfc3339(),
            }),
            HANDLE_SUCCESS,
        )
    } else {
        let message = format!("Simulated SMS delivery failure to '{}'", config.to);
        NodeOutcome::failed(
            Some(json!({ "sent": false, "to": config.to, "error": message })),
            message,
            Some(HANDLE_ERROR),
        )
    }
}

/// Non-finite rates never succeed; finite ones are clamped into `[0, 1]`.
fn roll<R: Rng + ?Sized>(rng: &mut R, success_rate: f64) -> bool {
    let rate = if success_rate.is_finite() {
        success_rate.clamp(0.0, 1.0)
    } else {
        0.0
    };
    rng.gen_bool(rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn certain_success_fires_success_handle() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = HttpRequestConfig {
            url: "https://example.test/api".into(),
            ..Default::default()
        };

        let outcome = http_request(&config, &json!({}), 1.0, &mut rng);
        assert!(outcome.success);
        assert_eq!(outcome.active_handles, vec!["success"]);
        assert_eq!(outcome.output.unwrap()["status"], 200);
    }

    #[test]
    fn certain_failure_is_an_error_branch_not_an_error() {
        let mut rng = StdRng::seed_from_u64(7);

        let outcome = send_email(&SendEmailConfig::default(), 0.0, &mut rng);
        assert!(!outcome.success);
        assert_eq!(outcome.active_handles, vec!["error"]);
        assert!(outcome.error.unwrap().contains("email"));

        let outcome = send_sms(&SendSmsConfig::default(), 0.0, &mut rng);
        assert!(outcome.fires("error"));
    }

    #[test]
    fn out_of_range_rates_are_clamped() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(send_sms(&SendSmsConfig::default(), 4.2, &mut rng).success);
        assert!(!send_sms(&SendSmsConfig::default(), -1.0, &mut rng).success);
    }

    #[test]
    fn non_finite_rates_always_fail() {
        let mut rng = StdRng::seed_from_u64(1);
        let config = HttpRequestConfig::default();
        for rate in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let outcome = http_request(&config, &json!({}), rate, &mut rng);
            assert!(!outcome.success, "rate {rate}");
            assert_eq!(outcome.active_handles, vec!["error"]);
        }
    }
}
