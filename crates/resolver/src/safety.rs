// SPDX-License-Identifier: MIT

//! Safety validation for the version-control (`git`) builtin: reject any
//! command that creates or pushes a ref whose leading path component is
//! `rollback`. Checking out an *existing* `rollback/*` branch is allowed.

/// Returns `Some(reason)` if `args` is a rejected git invocation.
pub fn check_git_args(args: &[String]) -> Option<String> {
    if args.is_empty() {
        return None;
    }

    match args[0].as_str() {
        "checkout" => {
            // `checkout -b <name>` creates a branch; `checkout <name>` just
            // switches to an existing one and is allowed.
            if let Some(pos) = args.iter().position(|a| a == "-b") {
                if let Some(name) = args.get(pos + 1) {
                    if starts_with_rollback(name) {
                        return Some(format!(
                            "SECURITY: refusing to create branch '{name}' via checkout -b"
                        ));
                    }
                }
            }
        }
        "branch" => {
            // First non-flag argument after `branch` is the name being
            // created (`git branch <name> [<start-point>]`).
            if let Some(name) = args.iter().skip(1).find(|a| !a.starts_with('-')) {
                if starts_with_rollback(name) {
                    return Some(format!("SECURITY: refusing to create branch '{name}' via branch"));
                }
            }
        }
        "push" => {
            for arg in &args[1..] {
                if arg.starts_with('-') {
                    continue;
                }
                if refspec_touches_rollback(arg) {
                    return Some(format!(
                        "SECURITY: refusing to push refspec '{arg}' touching rollback/"
                    ));
                }
            }
        }
        _ => {}
    }
    None
}

/// A ref name's *leading* path component is `rollback` — `rollback/x` yes,
/// `feature/rollback-support` no.
fn starts_with_rollback(name: &str) -> bool {
    name.split('/').next() == Some("rollback")
}

/// True if either side of a `src:dst` refspec (or a bare ref) has
/// `rollback` as a path component anywhere — covers
/// `refs/heads/rollback/*` and `refs/remotes/*/rollback/*`.
fn refspec_touches_rollback(refspec: &str) -> bool {
    refspec
        .split(':')
        .any(|side| side.split('/').any(|component| component == "rollback"))
}
