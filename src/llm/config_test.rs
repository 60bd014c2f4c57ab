use std::sync::Mutex;

use super::*;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// # Safety
/// Callers hold `ENV_LOCK` so no other test in this module races the env.
unsafe fn clear_llm_env() {
    unsafe {
        std::env::remove_var("LLM_PROVIDER");
        std::env::remove_var("LLM_MODEL");
        std::env::remove_var("LLM_API_KEY_ENV");
        std::env::remove_var("LLM_GEMINI_BASE_URL");
        std::env::remove_var("LLM_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("LLM_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("GEMINI_API_KEY");
        std::env::remove_var("ANTHROPIC_API_KEY");
        std::env::remove_var("DIAGRAMIFY_TEST_KEY");
    }
}

#[test]
fn from_env_defaults_to_gemini() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("GEMINI_API_KEY", "g-secret");
    }

    let cfg = LlmConfig::from_env().unwrap();
    assert_eq!(cfg.provider, LlmProviderKind::Gemini);
    assert_eq!(cfg.model, "gemini-2.5-flash");
    assert_eq!(cfg.gemini_base_url, DEFAULT_GEMINI_BASE_URL);
    assert_eq!(cfg.timeouts, LlmTimeouts::default());
    assert_eq!(cfg.api_key, "g-secret");

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_parses_anthropic_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("LLM_PROVIDER", "anthropic");
        std::env::set_var("LLM_API_KEY_ENV", "DIAGRAMIFY_TEST_KEY");
        std::env::set_var("DIAGRAMIFY_TEST_KEY", "sk-test");
        std::env::set_var("LLM_REQUEST_TIMEOUT_SECS", "42");
        std::env::set_var("LLM_CONNECT_TIMEOUT_SECS", "7");
    }

    let cfg = LlmConfig::from_env().unwrap();
    assert_eq!(cfg.provider, LlmProviderKind::Anthropic);
    assert_eq!(cfg.model, "claude-sonnet-4-5-20250929");
    assert_eq!(cfg.api_key, "sk-test");
    assert_eq!(cfg.timeouts, LlmTimeouts { request_secs: 42, connect_secs: 7 });

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_trims_gemini_base_url() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("GEMINI_API_KEY", "g");
        std::env::set_var("LLM_GEMINI_BASE_URL", "https://proxy.test/v1beta/");
    }

    let cfg = LlmConfig::from_env().unwrap();
    assert_eq!(cfg.gemini_base_url, "https://proxy.test/v1beta");

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_unknown_provider_errors() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("LLM_PROVIDER", "bad");
        std::env::set_var("GEMINI_API_KEY", "g");
    }

    let err = LlmConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("unknown LLM_PROVIDER"));

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_missing_key_names_the_variable() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("LLM_PROVIDER", "anthropic");
    }

    let err = LlmConfig::from_env().unwrap_err();
    assert!(matches!(err, LlmError::MissingApiKey { ref var } if var == "ANTHROPIC_API_KEY"));

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_blank_key_is_missing() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("GEMINI_API_KEY", "  ");
    }

    assert!(matches!(LlmConfig::from_env(), Err(LlmError::MissingApiKey { .. })));

    unsafe { clear_llm_env() };
}
