//! Cross-context access control through the runtime.

use crate::integration::test_utils::{runtime, runtime_with};
use scripthost::config::HostConfig;
use scripthost::engine::{ObjectRef, PropertyMap, Value};
use scripthost::error::{AccessOperation, HostError};
use scripthost::security::SecurityToken;
use std::sync::Arc;

#[test]
fn test_matching_tokens_allow_cross_context_access() {
    let (_engine, runtime) = runtime();
    let owner = runtime.create_context(Some(Arc::new(PropertyMap::new().with("secret", "s3"))));
    let visitor = runtime.create_context(None);
    runtime.set_security_token(&owner, "domain-a");
    runtime.set_security_token(&visitor, "domain-a");

    let _scope = runtime.scope(&visitor).unwrap();
    let target = runtime.access(&owner.global()).unwrap();
    assert_eq!(target.get("secret").unwrap(), Some(Value::from("s3")));
    target.set("visited", Value::Bool(true)).unwrap();
    assert_eq!(target.keys().unwrap(), vec!["secret", "visited"]);
    assert!(target.delete("visited"));
}

#[test]
fn test_mismatched_tokens_deny_access() {
    let (_engine, runtime) = runtime();
    let owner = runtime.create_context(Some(Arc::new(PropertyMap::new().with("secret", "s3"))));
    let visitor = runtime.create_context(None);
    runtime.set_security_token(&owner, "domain-a");
    runtime.set_security_token(&visitor, "domain-b");

    let _scope = runtime.scope(&visitor).unwrap();
    let target = runtime.access(&owner.global()).unwrap();

    let denied = target.get("secret").unwrap_err();
    assert_eq!(denied.operation, AccessOperation::Read);
    assert_eq!(denied.source_context, visitor.id());
    assert_eq!(denied.target, owner.id());
    assert_eq!(denied.property, "secret");

    let denied = target.set("secret", Value::Null).unwrap_err();
    assert_eq!(denied.operation, AccessOperation::Write);
    assert_eq!(
        target.keys().unwrap_err().operation,
        AccessOperation::Enumerate
    );

    // Denied deletes look like deleting a missing property.
    assert!(!target.delete("secret"));
    assert_eq!(
        owner.global_object().get("secret"),
        Some(Value::from("s3"))
    );
}

#[test]
fn test_default_domain_follows_configuration() {
    let (_engine, open) = runtime();
    let a = open.create_context(None);
    let b = open.create_context(None);
    assert!(open.check_access(&a, &b));

    let mut config = HostConfig::default();
    config.security.allow_default_domain = false;
    let (_engine, closed) = runtime_with(config);
    let a = closed.create_context(None);
    let b = closed.create_context(None);
    assert!(!closed.check_access(&a, &b));
    assert!(closed.check_access(&a, &a));
}

#[test]
fn test_token_change_takes_effect_on_next_access() {
    let (_engine, runtime) = runtime();
    let owner = runtime.create_context(None);
    let visitor = runtime.create_context(None);
    owner.global_object().set("x", Value::from(1));

    let _scope = runtime.scope(&visitor).unwrap();
    let target = runtime.access(&owner.global()).unwrap();
    assert!(target.get("x").is_ok());

    runtime.set_security_token(&owner, "locked");
    assert!(target.get("x").is_err());

    runtime.set_security_token(&owner, SecurityToken::none());
    assert!(target.get("x").is_ok());
}

#[test]
fn test_revoked_context_is_unreachable() {
    let (_engine, runtime) = runtime();
    let owner = runtime.create_context(None);
    let visitor = runtime.create_context(None);
    runtime.set_security_token(&owner, "shared");
    runtime.set_security_token(&visitor, "shared");

    runtime.security().revoke(&owner);
    assert!(!runtime.check_access(&visitor, &owner));
    runtime.security().reinstate(&owner);
    assert!(runtime.check_access(&visitor, &owner));
}

#[test]
fn test_detached_host_objects_are_not_checked() {
    let (_engine, runtime) = runtime();
    let visitor = runtime.create_context(None);
    runtime.set_security_token(&visitor, "isolated");
    let host_object = ObjectRef::detached(Arc::new(PropertyMap::new().with("version", "1.0")));

    let _scope = runtime.scope(&visitor).unwrap();
    let target = runtime.access(&host_object).unwrap();
    assert_eq!(target.get("version").unwrap(), Some(Value::from("1.0")));
}

#[test]
fn test_access_requires_a_current_context() {
    let (_engine, runtime) = runtime();
    let owner = runtime.create_context(None);
    assert!(matches!(
        runtime.access(&owner.global()),
        Err(HostError::Context(_))
    ));
}
