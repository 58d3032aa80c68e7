//! Behavioural contract every `QueryContext` backing must satisfy.
//!
//! The suite in `contract` is written once against `&mut dyn QueryContext`
//! and instantiated unchanged for each backing by `contract_suite!`.

#![allow(missing_docs)]

use std::sync::Arc;

use graphspi::db::MemGraph;
use graphspi::query::CounterMetrics;
use graphspi::{
    ContextOptions, GraphDbQueryContext, KernelParts, KernelQueryContext, LockConfig,
    QueryContext,
};

/// Routes library events to the test output when `RUST_LOG` is set.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn open_kernel(options: ContextOptions) -> Box<dyn QueryContext> {
    let parts = KernelParts::in_memory(LockConfig::fail_fast());
    Box::new(KernelQueryContext::from_parts(
        &parts,
        parts.begin_transaction(),
        options,
    ))
}

fn open_graph_db(options: ContextOptions) -> Box<dyn QueryContext> {
    Box::new(GraphDbQueryContext::new(Arc::new(MemGraph::new()), options))
}

mod contract {
    use super::*;
    use graphspi::{CancelToken, Direction, KeyId, NodeId, RelId, Result, SpiError, Value};

    fn listed(
        ctx: &mut dyn QueryContext,
        node: NodeId,
        direction: Direction,
        types: &[KeyId],
    ) -> Result<Vec<RelId>> {
        ctx.get_relationships_for(node, direction, types)?.collect()
    }

    pub fn property_key_round_trip(ctx: &mut dyn QueryContext) -> Result<()> {
        let name = ctx.get_or_create_property_key_id("name")?;
        assert_eq!(ctx.get_or_create_property_key_id("name")?, name);
        assert_eq!(ctx.get_property_key_id("name")?, name);
        let age = ctx.get_or_create_property_key_id("age")?;
        assert_ne!(age, name);
        assert_eq!(
            ctx.get_property_key_id("nonexistent"),
            Err(SpiError::KeyNotFound("nonexistent".into()))
        );
        Ok(())
    }

    pub fn relationship_type_round_trip(ctx: &mut dyn QueryContext) -> Result<()> {
        assert!(ctx
            .get_relationship_type_id("KNOWS")
            .is_err_and(|e| e.is_not_found()));
        let knows = ctx.get_or_create_relationship_type_id("KNOWS")?;
        assert_eq!(ctx.get_or_create_relationship_type_id("KNOWS")?, knows);
        assert_eq!(ctx.get_relationship_type_id("KNOWS")?, knows);
        Ok(())
    }

    pub fn node_lifecycle(ctx: &mut dyn QueryContext) -> Result<()> {
        let first = ctx.create_node()?;
        let second = ctx.create_node()?;
        assert_ne!(first, second);
        assert!(ctx.node_exists(first)?);

        ctx.delete_node(first)?;
        assert!(!ctx.node_exists(first)?);
        assert_eq!(ctx.delete_node(first), Err(SpiError::NodeNotFound(first)));
        assert!(ctx.node_exists(second)?);
        Ok(())
    }

    pub fn node_property_round_trip(ctx: &mut dyn QueryContext) -> Result<()> {
        let node = ctx.create_node()?;
        let name = ctx.get_or_create_property_key_id("name")?;
        assert_eq!(ctx.get_node_property(node, name)?, None);

        ctx.set_node_property(node, name, Value::from("BOB!!"))?;
        assert_eq!(ctx.get_node_property(node, name)?, Some(Value::from("BOB!!")));

        let tags = ctx.get_or_create_property_key_id("tags")?;
        let array = Value::from(vec!["a".to_owned(), "b".to_owned()]);
        ctx.set_node_property(node, tags, array.clone())?;
        assert_eq!(ctx.get_node_property(node, tags)?, Some(array));

        assert_eq!(
            ctx.remove_node_property(node, name)?,
            Some(Value::from("BOB!!"))
        );
        assert_eq!(ctx.get_node_property(node, name)?, None);
        Ok(())
    }

    pub fn property_access_on_missing_entities(ctx: &mut dyn QueryContext) -> Result<()> {
        let name = ctx.get_or_create_property_key_id("name")?;
        let ghost = NodeId(4096);
        assert_eq!(
            ctx.get_node_property(ghost, name),
            Err(SpiError::NodeNotFound(ghost))
        );
        assert_eq!(
            ctx.set_node_property(ghost, name, Value::Int(1)),
            Err(SpiError::NodeNotFound(ghost))
        );
        assert_eq!(
            ctx.get_relationship_property(RelId(4096), name),
            Err(SpiError::RelationshipNotFound(RelId(4096)))
        );
        let node = ctx.create_node()?;
        assert_eq!(
            ctx.get_node_property(node, KeyId(999)),
            Err(SpiError::KeyIdNotFound(KeyId(999)))
        );
        Ok(())
    }

    pub fn relationship_property_round_trip(ctx: &mut dyn QueryContext) -> Result<()> {
        let a = ctx.create_node()?;
        let b = ctx.create_node()?;
        let knows = ctx.get_or_create_relationship_type_id("KNOWS")?;
        let rel = ctx.create_relationship(a, b, knows)?;
        let since = ctx.get_or_create_property_key_id("since")?;

        ctx.set_relationship_property(rel, since, Value::Int(1999))?;
        assert_eq!(ctx.get_relationship_property(rel, since)?, Some(Value::Int(1999)));
        ctx.set_relationship_property(rel, since, Value::Int(2001))?;
        assert_eq!(
            ctx.remove_relationship_property(rel, since)?,
            Some(Value::Int(2001))
        );
        assert_eq!(ctx.get_relationship_property(rel, since)?, None);
        Ok(())
    }

    pub fn relationship_visibility_by_direction(ctx: &mut dyn QueryContext) -> Result<()> {
        let a = ctx.create_node()?;
        let b = ctx.create_node()?;
        let knows = ctx.get_or_create_relationship_type_id("KNOWS")?;
        let rel = ctx.create_relationship(a, b, knows)?;

        assert_eq!(listed(ctx, a, Direction::Outgoing, &[knows])?, vec![rel]);
        assert_eq!(listed(ctx, b, Direction::Incoming, &[knows])?, vec![rel]);
        assert!(listed(ctx, a, Direction::Incoming, &[knows])?.is_empty());
        assert!(listed(ctx, b, Direction::Outgoing, &[knows])?.is_empty());
        assert_eq!(listed(ctx, a, Direction::Both, &[])?, vec![rel]);

        let record = ctx.relationship(rel)?;
        assert_eq!((record.start, record.end, record.rel_type), (a, b, knows));
        assert_eq!(record.other_node(a), Some(b));
        Ok(())
    }

    pub fn type_filter(ctx: &mut dyn QueryContext) -> Result<()> {
        let hub = ctx.create_node()?;
        let x = ctx.create_node()?;
        let y = ctx.create_node()?;
        let t1 = ctx.get_or_create_relationship_type_id("T1")?;
        let t2 = ctx.get_or_create_relationship_type_id("T2")?;
        let r1 = ctx.create_relationship(hub, x, t1)?;
        let r2 = ctx.create_relationship(y, hub, t2)?;

        assert_eq!(listed(ctx, hub, Direction::Both, &[t1])?, vec![r1]);
        assert_eq!(listed(ctx, hub, Direction::Both, &[t2])?, vec![r2]);
        assert_eq!(listed(ctx, hub, Direction::Both, &[])?, vec![r1, r2]);
        assert_eq!(listed(ctx, hub, Direction::Both, &[t1, t2])?, vec![r1, r2]);
        assert_eq!(
            ctx.get_relationships_for(hub, Direction::Both, &[KeyId(77)])
                .err(),
            Some(SpiError::RelationshipTypeNotFound(KeyId(77)))
        );
        Ok(())
    }

    pub fn self_loop_listed_once(ctx: &mut dyn QueryContext) -> Result<()> {
        let node = ctx.create_node()?;
        let t = ctx.get_or_create_relationship_type_id("SELF")?;
        let rel = ctx.create_relationship(node, node, t)?;
        assert_eq!(listed(ctx, node, Direction::Both, &[])?, vec![rel]);
        assert_eq!(listed(ctx, node, Direction::Outgoing, &[])?, vec![rel]);
        assert_eq!(listed(ctx, node, Direction::Incoming, &[])?, vec![rel]);
        Ok(())
    }

    pub fn relationship_requires_endpoints(ctx: &mut dyn QueryContext) -> Result<()> {
        let a = ctx.create_node()?;
        let t = ctx.get_or_create_relationship_type_id("KNOWS")?;
        let ghost = NodeId(4096);
        assert_eq!(
            ctx.create_relationship(a, ghost, t),
            Err(SpiError::NodeNotFound(ghost))
        );
        assert_eq!(
            ctx.create_relationship(ghost, a, t),
            Err(SpiError::NodeNotFound(ghost))
        );
        assert!(listed(ctx, a, Direction::Both, &[])?.is_empty());
        assert_eq!(
            ctx.get_relationships_for(ghost, Direction::Both, &[]).err(),
            Some(SpiError::NodeNotFound(ghost))
        );
        Ok(())
    }

    pub fn relationship_deletion(ctx: &mut dyn QueryContext) -> Result<()> {
        let a = ctx.create_node()?;
        let b = ctx.create_node()?;
        let t = ctx.get_or_create_relationship_type_id("KNOWS")?;
        let keep = ctx.create_relationship(a, b, t)?;
        let doomed = ctx.create_relationship(a, b, t)?;
        assert_eq!(listed(ctx, a, Direction::Outgoing, &[])?, vec![keep, doomed]);

        ctx.delete_relationship(doomed)?;
        assert_eq!(
            ctx.delete_relationship(doomed),
            Err(SpiError::RelationshipNotFound(doomed))
        );
        assert_eq!(
            ctx.relationship(doomed),
            Err(SpiError::RelationshipNotFound(doomed))
        );
        assert_eq!(listed(ctx, a, Direction::Outgoing, &[])?, vec![keep]);
        assert_eq!(listed(ctx, b, Direction::Incoming, &[])?, vec![keep]);
        Ok(())
    }

    pub fn node_delete_leaves_relationships(ctx: &mut dyn QueryContext) -> Result<()> {
        let a = ctx.create_node()?;
        let b = ctx.create_node()?;
        let t = ctx.get_or_create_relationship_type_id("KNOWS")?;
        let rel = ctx.create_relationship(a, b, t)?;
        ctx.delete_node(a)?;
        assert_eq!(ctx.relationship(rel)?.start, a);
        assert_eq!(listed(ctx, b, Direction::Incoming, &[])?, vec![rel]);
        Ok(())
    }

    pub fn listing_is_repeatable(ctx: &mut dyn QueryContext) -> Result<()> {
        let hub = ctx.create_node()?;
        let t = ctx.get_or_create_relationship_type_id("KNOWS")?;
        for _ in 0..5 {
            let other = ctx.create_node()?;
            ctx.create_relationship(hub, other, t)?;
        }
        let first = listed(ctx, hub, Direction::Both, &[])?;
        let second = listed(ctx, hub, Direction::Both, &[])?;
        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(first, sorted);
        Ok(())
    }

    pub fn close_is_idempotent(ctx: &mut dyn QueryContext) -> Result<()> {
        let node = ctx.create_node()?;
        ctx.close()?;
        ctx.close()?;
        assert_eq!(ctx.create_node(), Err(SpiError::Closed));
        assert_eq!(ctx.node_exists(node), Err(SpiError::Closed));
        assert_eq!(ctx.get_property_key_id("name"), Err(SpiError::Closed));
        assert!(ctx
            .get_relationships_for(node, Direction::Both, &[])
            .is_err_and(|e| e == SpiError::Closed));
        Ok(())
    }

    pub fn cancellation(open: fn(ContextOptions) -> Box<dyn QueryContext>) -> Result<()> {
        let token = CancelToken::new();
        let mut ctx = open(ContextOptions::new().cancel_token(token.clone()));
        let a = ctx.create_node()?;
        let t = ctx.get_or_create_relationship_type_id("KNOWS")?;
        for _ in 0..3 {
            let b = ctx.create_node()?;
            ctx.create_relationship(a, b, t)?;
        }
        let mut cursor = ctx.get_relationships_for(a, Direction::Outgoing, &[])?;
        assert!(cursor.next().is_some_and(|r| r.is_ok()));
        token.cancel();
        assert_eq!(cursor.next(), Some(Err(SpiError::Cancelled)));
        assert_eq!(cursor.next(), None);
        assert_eq!(
            ctx.get_relationships_for(a, Direction::Outgoing, &[]).err(),
            Some(SpiError::Cancelled)
        );
        assert_eq!(ctx.create_node(), Err(SpiError::Cancelled));
        Ok(())
    }

    pub fn metrics(open: fn(ContextOptions) -> Box<dyn QueryContext>) -> Result<()> {
        let metrics = Arc::new(CounterMetrics::default());
        let mut ctx = open(ContextOptions::new().metrics(metrics.clone()));
        let a = ctx.create_node()?;
        let b = ctx.create_node()?;
        let t = ctx.get_or_create_relationship_type_id("KNOWS")?;
        let rel = ctx.create_relationship(a, b, t)?;
        listed(&mut *ctx, a, Direction::Outgoing, &[])?;
        listed(&mut *ctx, a, Direction::Both, &[])?;
        ctx.delete_relationship(rel)?;
        ctx.delete_node(b)?;

        assert_eq!(CounterMetrics::get(&metrics.nodes_created), 2);
        assert_eq!(CounterMetrics::get(&metrics.nodes_deleted), 1);
        assert_eq!(CounterMetrics::get(&metrics.relationships_created), 1);
        assert_eq!(CounterMetrics::get(&metrics.relationships_deleted), 1);
        assert_eq!(CounterMetrics::get(&metrics.scans_out), 1);
        assert_eq!(CounterMetrics::get(&metrics.scans_both), 1);
        assert!(CounterMetrics::get(&metrics.snapshot_hits) > 0);
        Ok(())
    }
}

macro_rules! contract_suite {
    ($backing:ident, $open:path) => {
        mod $backing {
            use super::*;
            use graphspi::Result;

            fn fresh() -> Box<dyn QueryContext> {
                init_tracing();
                $open(ContextOptions::default())
            }

            #[test]
            fn property_key_round_trip() -> Result<()> {
                contract::property_key_round_trip(&mut *fresh())
            }

            #[test]
            fn relationship_type_round_trip() -> Result<()> {
                contract::relationship_type_round_trip(&mut *fresh())
            }

            #[test]
            fn node_lifecycle() -> Result<()> {
                contract::node_lifecycle(&mut *fresh())
            }

            #[test]
            fn node_property_round_trip() -> Result<()> {
                contract::node_property_round_trip(&mut *fresh())
            }

            #[test]
            fn property_access_on_missing_entities() -> Result<()> {
                contract::property_access_on_missing_entities(&mut *fresh())
            }

            #[test]
            fn relationship_property_round_trip() -> Result<()> {
                contract::relationship_property_round_trip(&mut *fresh())
            }

            #[test]
            fn relationship_visibility_by_direction() -> Result<()> {
                contract::relationship_visibility_by_direction(&mut *fresh())
            }

            #[test]
            fn type_filter() -> Result<()> {
                contract::type_filter(&mut *fresh())
            }

            #[test]
            fn self_loop_listed_once() -> Result<()> {
                contract::self_loop_listed_once(&mut *fresh())
            }

            #[test]
            fn relationship_requires_endpoints() -> Result<()> {
                contract::relationship_requires_endpoints(&mut *fresh())
            }

            #[test]
            fn relationship_deletion() -> Result<()> {
                contract::relationship_deletion(&mut *fresh())
            }

            #[test]
            fn node_delete_leaves_relationships() -> Result<()> {
                contract::node_delete_leaves_relationships(&mut *fresh())
            }

            #[test]
            fn listing_is_repeatable() -> Result<()> {
                contract::listing_is_repeatable(&mut *fresh())
            }

            #[test]
            fn close_is_idempotent() -> Result<()> {
                contract::close_is_idempotent(&mut *fresh())
            }

            #[test]
            fn cancellation() -> Result<()> {
                contract::cancellation($open)
            }

            #[test]
            fn metrics() -> Result<()> {
                contract::metrics($open)
            }
        }
    };
}

contract_suite!(kernel_backed, open_kernel);
contract_suite!(graph_db_backed, open_graph_db);
