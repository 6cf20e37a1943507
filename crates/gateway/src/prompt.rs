//! System prompt composition.
//!
//! The final instruction block handed to a provider is built from the
//! configured persona, a reply-language directive, and (when enabled)
//! the action marker vocabulary. Retrieved site content is carried
//! separately on the request and appended by the provider adapter.

use sitechat_actions::ACTION_INSTRUCTIONS;
use sitechat_config::ChatConfig;
use sitechat_language::language_name;

/// Persona used when the operator has not configured one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant for this website. \
Answer questions using the provided website content when it is relevant. \
Be concise and friendly. If you do not know the answer, say so rather than guessing.";

/// Builds the system prompt for one exchange.
///
/// `language_code` is the already-resolved reply language (user text
/// detection beats the browser signal, which beats the configured
/// default), so this function only has to phrase the directive.
pub fn compose_system_prompt(config: &ChatConfig, language_code: &str) -> String {
    let mut prompt = if config.system_prompt.trim().is_empty() {
        DEFAULT_SYSTEM_PROMPT.to_string()
    } else {
        config.system_prompt.trim().to_string()
    };

    prompt.push_str("\n\nAlways reply in ");
    prompt.push_str(language_name(language_code));
    prompt.push('.');

    if config.multilingual {
        prompt.push_str(
            " If the user switches language mid-conversation, switch with them.",
        );
    }

    if config.actions_enabled {
        prompt.push_str("\n\n");
        prompt.push_str(ACTION_INSTRUCTIONS);
    }

    prompt
}
