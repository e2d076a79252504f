//! Contract/handler shape checking.
//!
//! [`check_shape`] runs before any route is registered, so an incomplete
//! handler tree fails at startup instead of on the first request.

use crate::contract::{Contract, ContractNode};
use crate::error::RegistrationError;
use crate::handler::{HandlerNode, Handlers};

/// Verifies that `handlers` has exactly the shape of `contract`.
///
/// Every operation needs a handler and every nested contract a nested
/// handler group; handlers without a contract entry and names registered
/// twice are rejected as well. The first problem found, in declaration
/// order, is reported.
pub fn check_shape(contract: &Contract, handlers: &Handlers) -> Result<(), RegistrationError> {
    check_level(contract, handlers, &[])
}

fn check_level(
    contract: &Contract,
    handlers: &Handlers,
    scope: &[&str],
) -> Result<(), RegistrationError> {
    if let Some(name) = handlers.duplicates().first() {
        return Err(RegistrationError::DuplicateHandler {
            name: dotted(scope, name),
        });
    }

    for (name, node) in contract.entries() {
        let nested_scope: Vec<&str> = scope.iter().copied().chain([name]).collect();
        match (node, handlers.get(name)) {
            (ContractNode::Operation(_), None) => {
                return Err(RegistrationError::MissingHandler {
                    operation: nested_scope.join("."),
                });
            }
            // A missing group reports its first missing operation.
            (ContractNode::Router(nested), None) => {
                check_level(nested, &Handlers::new(), &nested_scope)?;
            }
            (ContractNode::Operation(_), Some(HandlerNode::Handler(_))) => {}
            (ContractNode::Router(nested), Some(HandlerNode::Router(nested_handlers))) => {
                check_level(nested, nested_handlers, &nested_scope)?;
            }
            (node, Some(found)) => {
                return Err(RegistrationError::ShapeMismatch {
                    name: nested_scope.join("."),
                    expected: node.kind(),
                    found: found.kind(),
                });
            }
        }
    }

    if let Some((name, _)) = handlers
        .entries()
        .find(|(name, _)| contract.entry(name).is_none())
    {
        return Err(RegistrationError::UnexpectedHandler {
            name: dotted(scope, name),
        });
    }

    Ok(())
}

fn dotted(scope: &[&str], name: &str) -> String {
    let mut parts = scope.to_vec();
    parts.push(name);
    parts.join(".")
}
