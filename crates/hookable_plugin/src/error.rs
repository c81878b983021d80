//! Error types for the plugin host.

use hookable_hooks::HookKind;
use hookable_hooks::error::HookError;
use hookable_hooks::path::PathError;

/// Errors returned by [`PluginSystem`](crate::PluginSystem) and its
/// collaborators.
///
/// Every variant describes a configuration mistake. Listener failures during
/// emission are isolated by the hooks and never surface here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    /// A plugin was registered or removed without a name.
    #[error("missing plugin name")]
    MissingName,
    /// A plugin references a lifecycle key that does not exist.
    #[error("plugin '{plugin}' uses unknown hook '{hook}'")]
    UnknownHook {
        /// The missing lifecycle key.
        hook: String,
        /// The plugin that referenced it.
        plugin: String,
    },
    /// A listener's kind does not match the strategy of its hook.
    #[error("hook '{hook}' expects a {expected} listener, got {found}")]
    ListenerKind {
        /// Lifecycle key of the hook.
        hook: String,
        /// Strategy of the hook.
        expected: HookKind,
        /// Strategy the listener was written for.
        found: HookKind,
    },
    /// A lifecycle already declares a hook under this key.
    #[error("duplicate lifecycle hook '{0}'")]
    DuplicateHook(String),
    /// Inheriting would redeclare an existing lifecycle key.
    #[error("'{0}' hook already exists")]
    InheritHookConflict(String),
    /// Inheriting would register a plugin whose name is already taken.
    #[error("'{0}' plugin already exists")]
    InheritPluginConflict(String),
    /// The plugin system is locked.
    #[error("the plugin system is locked")]
    Locked,
    /// The performance correlator has been closed.
    #[error("the performance correlator is closed")]
    Closed,
    /// A correlation path could not be parsed.
    #[error("invalid correlation path: {0}")]
    Path(#[from] PathError),
    /// An underlying hook rejected the operation.
    #[error(transparent)]
    Hook(#[from] HookError),
}
