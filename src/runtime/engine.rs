//! Script engine construction.
//!
//! # Responsibilities
//! - Build the single `rhai::Engine` shared by every handler unit
//! - Register the host API visible to handler scripts (`reply`)
//! - Route script `print`/`debug` output into tracing
//!
//! # Design Decisions
//! - Engine limits are applied once at startup; config reloads do not rebuild it
//! - Handler code runs with whatever the engine exposes and nothing is
//!   isolated beyond that: operators are trusted to author their own handlers

use rhai::{Dynamic, Engine, Map, INT};

use crate::config::HandlerConfig;

/// Explicit response built by a handler via `reply(body, status[, headers])`.
#[derive(Debug, Clone)]
pub struct Reply {
    pub body: Dynamic,
    pub status: INT,
    pub headers: Map,
}

/// Build the handler engine.
pub fn build_engine(config: &HandlerConfig) -> Engine {
    let mut engine = Engine::new();

    engine.set_max_operations(config.max_operations);
    engine.set_max_call_levels(config.max_call_levels);

    engine.on_print(|text| tracing::info!(target: "handler", "{}", text));
    engine.on_debug(|text, source, pos| {
        tracing::debug!(target: "handler", source = ?source, position = %pos, "{}", text)
    });

    engine.register_type_with_name::<Reply>("Reply");
    engine.register_fn("reply", |body: Dynamic, status: INT| Reply {
        body,
        status,
        headers: Map::new(),
    });
    engine.register_fn("reply", |body: Dynamic, status: INT, headers: Map| Reply {
        body,
        status,
        headers,
    });

    engine
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_is_available_to_scripts() {
        let engine = build_engine(&HandlerConfig::default());
        let value: Dynamic = engine.eval(r#"reply("hi", 201)"#).unwrap();
        let reply = value.try_cast::<Reply>().unwrap();
        assert_eq!(reply.status, 201);
        assert!(reply.headers.is_empty());
    }

    #[test]
    fn test_operation_limit_stops_runaway_scripts() {
        let config = HandlerConfig {
            max_operations: 1_000,
            ..HandlerConfig::default()
        };
        let engine = build_engine(&config);
        let result = engine.run("loop { }");
        assert!(result.is_err());
    }
}
