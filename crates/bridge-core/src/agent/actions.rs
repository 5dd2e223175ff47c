//! Built-in action set mirroring the avatar's capability surface.

use std::sync::Arc;
use std::time::Duration;

use crate::agent::registry::{
    ActionKind, ActionRegistry, ActionSpec, ParamKind, ParamSpec, SessionAction, StartFuture, WAIT,
};
use crate::agent::wire::CommandArg;
use crate::session::{Completion, ControlFlag, FaceVector, Position, Session};

/// How long the jump control is held down for a single hop.
const JUMP_PULSE: Duration = Duration::from_millis(100);
/// How close navigation must get to the requested coordinate.
const GOAL_TOLERANCE: f64 = 1.0;

fn number_arg(args: &[CommandArg], idx: usize, name: &str) -> anyhow::Result<f64> {
    args.get(idx)
        .and_then(CommandArg::as_f64)
        .ok_or_else(|| anyhow::anyhow!("missing or non-numeric argument: {name}"))
}

fn text_arg(args: &[CommandArg], idx: usize, name: &str) -> anyhow::Result<String> {
    match args.get(idx).and_then(CommandArg::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(anyhow::anyhow!("missing or empty argument: {name}")),
    }
}

fn count_arg(args: &[CommandArg], idx: usize, name: &str) -> anyhow::Result<u32> {
    let n = number_arg(args, idx, name)?;
    if n < 1.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
        anyhow::bail!("argument {name} must be a positive whole number, got {n}");
    }
    Ok(n as u32)
}

fn position_args(args: &[CommandArg]) -> anyhow::Result<Position> {
    Ok(Position {
        x: number_arg(args, 0, "x")?,
        y: number_arg(args, 1, "y")?,
        z: number_arg(args, 2, "z")?,
    })
}

fn done() -> Completion {
    Box::pin(async { Ok(()) })
}

struct Jump;

impl SessionAction for Jump {
    fn start(&self, session: Arc<dyn Session>, _args: Vec<CommandArg>) -> StartFuture {
        Box::pin(async move {
            session.set_control_state(ControlFlag::Jump, true).await?;
            let completion: Completion = Box::pin(async move {
                tokio::time::sleep(JUMP_PULSE).await;
                session.set_control_state(ControlFlag::Jump, false).await
            });
            Ok(completion)
        })
    }
}

struct Move;

impl SessionAction for Move {
    fn start(&self, session: Arc<dyn Session>, args: Vec<CommandArg>) -> StartFuture {
        Box::pin(async move {
            let target = position_args(&args)?;
            session.navigate_to(target, GOAL_TOLERANCE).await
        })
    }
}

struct Place;

impl SessionAction for Place {
    fn start(&self, session: Arc<dyn Session>, args: Vec<CommandArg>) -> StartFuture {
        Box::pin(async move {
            let pos = position_args(&args)?;
            let block = text_arg(&args, 3, "block")?;
            session.place_block_at(pos, FaceVector::UP, &block).await
        })
    }
}

struct Break;

impl SessionAction for Break {
    fn start(&self, session: Arc<dyn Session>, args: Vec<CommandArg>) -> StartFuture {
        Box::pin(async move {
            let pos = position_args(&args)?;
            session.break_block_at(pos).await
        })
    }
}

struct Toss;

impl SessionAction for Toss {
    fn start(&self, session: Arc<dyn Session>, args: Vec<CommandArg>) -> StartFuture {
        Box::pin(async move {
            let item = text_arg(&args, 0, "item")?;
            let count = count_arg(&args, 1, "count")?;
            session.toss_item(&item, count).await?;
            Ok(done())
        })
    }
}

const NUM: ParamKind = ParamKind::Number;
const TEXT: ParamKind = ParamKind::Text;

const POS_PARAMS: &[ParamSpec] = &[
    ParamSpec {
        name: "x",
        kind: NUM,
    },
    ParamSpec {
        name: "y",
        kind: NUM,
    },
    ParamSpec {
        name: "z",
        kind: NUM,
    },
];

const PLACE_PARAMS: &[ParamSpec] = &[
    ParamSpec {
        name: "x",
        kind: NUM,
    },
    ParamSpec {
        name: "y",
        kind: NUM,
    },
    ParamSpec {
        name: "z",
        kind: NUM,
    },
    ParamSpec {
        name: "block",
        kind: TEXT,
    },
];

const TOSS_PARAMS: &[ParamSpec] = &[
    ParamSpec {
        name: "item",
        kind: TEXT,
    },
    ParamSpec {
        name: "count",
        kind: NUM,
    },
];

/// The fixed startup table. Descriptions feed the decision prompt verbatim.
pub fn builtin() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    registry.register(ActionSpec {
        name: "jump",
        params: &[],
        description: "Makes the avatar perform a single jump.",
        kind: ActionKind::Session(Box::new(Jump)),
    });
    registry.register(ActionSpec {
        name: "move",
        params: POS_PARAMS,
        description: "Walks the avatar to the given coordinate, finishing when it arrives.",
        kind: ActionKind::Session(Box::new(Move)),
    });
    registry.register(ActionSpec {
        name: "place",
        params: PLACE_PARAMS,
        description: "Places the named block on top of the given coordinate.",
        kind: ActionKind::Session(Box::new(Place)),
    });
    registry.register(ActionSpec {
        name: "break",
        params: POS_PARAMS,
        description: "Breaks the block at the given coordinate.",
        kind: ActionKind::Session(Box::new(Break)),
    });
    registry.register(ActionSpec {
        name: "toss",
        params: TOSS_PARAMS,
        description: "Tosses the given number of items from the inventory.",
        kind: ActionKind::Session(Box::new(Toss)),
    });
    registry.register(ActionSpec {
        name: WAIT,
        params: &[],
        description: "Waits for every running action to finish before continuing.",
        kind: ActionKind::AwaitDrain,
    });
    registry
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use super::*;
    use crate::session::{SessionFuture, Snapshot};

    #[derive(Default)]
    struct FakeSession {
        log: Mutex<Vec<String>>,
    }

    impl FakeSession {
        fn log_entries(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl Session for FakeSession {
        fn set_control_state(&self, flag: ControlFlag, active: bool) -> SessionFuture<'_, ()> {
            Box::pin(async move {
                self.log
                    .lock()
                    .unwrap()
                    .push(format!("control {flag:?} {active}"));
                Ok(())
            })
        }

        fn navigate_to(&self, target: Position, _tolerance: f64) -> SessionFuture<'_, Completion> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!(
                    "navigate {} {} {}",
                    target.x, target.y, target.z
                ));
                Ok(done())
            })
        }

        fn place_block_at<'a>(
            &'a self,
            pos: Position,
            face: FaceVector,
            block: &'a str,
        ) -> SessionFuture<'a, Completion> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!(
                    "place {block} at {} {} {} face {} {} {}",
                    pos.x, pos.y, pos.z, face.x, face.y, face.z
                ));
                Ok(done())
            })
        }

        fn break_block_at(&self, pos: Position) -> SessionFuture<'_, Completion> {
            Box::pin(async move {
                self.log
                    .lock()
                    .unwrap()
                    .push(format!("break {} {} {}", pos.x, pos.y, pos.z));
                Ok(done())
            })
        }

        fn toss_item<'a>(&'a self, item: &'a str, count: u32) -> SessionFuture<'a, ()> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!("toss {item} x{count}"));
                Ok(())
            })
        }

        fn snapshot(&self) -> SessionFuture<'_, Snapshot> {
            Box::pin(async move { anyhow::bail!("not used") })
        }
    }

    fn number(n: f64) -> CommandArg {
        CommandArg::Number(n)
    }

    fn text(s: &str) -> CommandArg {
        CommandArg::Text(s.to_string())
    }

    #[test]
    fn builtin_table_is_complete_and_ordered() {
        let registry = builtin();
        assert_eq!(registry.len(), 6);
        for name in ["jump", "move", "place", "break", "toss", WAIT] {
            assert!(registry.lookup(name).is_some(), "missing {name}");
        }
        assert!(matches!(
            registry.lookup(WAIT).map(|s| &s.kind),
            Some(ActionKind::AwaitDrain)
        ));
    }

    #[test]
    fn argument_coercion_matches_wire_leniency() {
        assert_eq!(number_arg(&[text("10.5")], 0, "x").unwrap(), 10.5);
        assert!(number_arg(&[text("stone")], 0, "x").is_err());
        assert!(number_arg(&[], 0, "x").is_err());

        assert_eq!(text_arg(&[text(" dirt ")], 0, "block").unwrap(), "dirt");
        assert!(text_arg(&[number(3.0)], 0, "block").is_err());

        assert_eq!(count_arg(&[number(3.0)], 0, "count").unwrap(), 3);
        assert!(count_arg(&[number(0.0)], 0, "count").is_err());
        assert!(count_arg(&[number(1.5)], 0, "count").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn jump_pulses_the_control_flag() {
        let session = Arc::new(FakeSession::default());
        let dyn_session: Arc<dyn Session> = Arc::clone(&session) as Arc<dyn Session>;

        let completion = Jump.start(dyn_session, Vec::new()).await.unwrap();
        assert_eq!(session.log_entries(), vec!["control Jump true"]);

        completion.await.unwrap();
        assert_eq!(
            session.log_entries(),
            vec!["control Jump true", "control Jump false"]
        );
    }

    #[tokio::test]
    async fn place_uses_the_upward_face() {
        let session = Arc::new(FakeSession::default());
        let dyn_session: Arc<dyn Session> = Arc::clone(&session) as Arc<dyn Session>;

        let completion = Place
            .start(
                dyn_session,
                vec![number(1.0), number(64.0), number(2.0), text("stone")],
            )
            .await
            .unwrap();
        completion.await.unwrap();

        assert_eq!(
            session.log_entries(),
            vec!["place stone at 1 64 2 face 0 1 0"]
        );
    }

    #[tokio::test]
    async fn move_rejects_missing_coordinates() {
        let session: Arc<dyn Session> = Arc::new(FakeSession::default());
        let err = Move
            .start(session, vec![number(1.0)])
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(format!("{err}").contains("y"));
    }
}
