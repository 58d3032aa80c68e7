//! Repeatable reads: a context keeps seeing what it first observed while
//! other contexts change the graph underneath it.

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;

use graphspi::db::{GraphDatabase, MemGraph};
use graphspi::{
    ContextOptions, Direction, GraphDbQueryContext, KernelParts, KernelQueryContext, LockConfig,
    QueryContext, RelId, Result, Value,
};

type Opener = Box<dyn Fn() -> Box<dyn QueryContext>>;

/// Two contexts opened up front plus a way to open more on the same graph.
type Setup = (Box<dyn QueryContext>, Box<dyn QueryContext>, Opener);

fn kernel_pair() -> Setup {
    let parts = KernelParts::in_memory(LockConfig::fail_fast());
    let open = move || -> Box<dyn QueryContext> {
        Box::new(KernelQueryContext::from_parts(
            &parts,
            parts.begin_transaction(),
            ContextOptions::default(),
        ))
    };
    (open(), open(), Box::new(open))
}

fn graph_db_pair() -> Setup {
    let db: Arc<dyn GraphDatabase> = Arc::new(MemGraph::new());
    let open = move || -> Box<dyn QueryContext> {
        Box::new(GraphDbQueryContext::new(db.clone(), ContextOptions::default()))
    };
    (open(), open(), Box::new(open))
}

fn listed(ctx: &mut dyn QueryContext, node: graphspi::NodeId) -> Result<Vec<RelId>> {
    ctx.get_relationships_for(node, Direction::Both, &[])?.collect()
}

fn concurrent_writes_stay_invisible((mut writer, mut reader, open): Setup) -> Result<()> {
    // committed state the reader starts from
    let a = writer.create_node()?;
    let b = writer.create_node()?;
    let name = writer.get_or_create_property_key_id("name")?;
    let knows = writer.get_or_create_relationship_type_id("KNOWS")?;
    writer.set_node_property(a, name, Value::from("ann"))?;
    let first_rel = writer.create_relationship(a, b, knows)?;
    writer.close()?;
    // ends the writer's transaction along with its locks
    drop(writer);

    let reader_name = reader.get_or_create_property_key_id("name")?;
    assert_eq!(reader.get_node_property(a, reader_name)?, Some(Value::from("ann")));
    assert_eq!(listed(&mut *reader, a)?, vec![first_rel]);
    assert!(reader.node_exists(b)?);

    let mut other = open();
    let other_name = other.get_or_create_property_key_id("name")?;
    let other_knows = other.get_or_create_relationship_type_id("KNOWS")?;
    let second_rel = thread::scope(|scope| {
        scope
            .spawn(|| -> Result<RelId> {
                other.set_node_property(a, other_name, Value::from("bob"))?;
                let rel = other.create_relationship(b, a, other_knows)?;
                other.delete_relationship(first_rel)?;
                other.delete_node(b)?;
                other.close()?;
                Ok(rel)
            })
            .join()
            .expect("writer panicked")
    })?;

    assert_eq!(reader.get_node_property(a, reader_name)?, Some(Value::from("ann")));
    assert_eq!(listed(&mut *reader, a)?, vec![first_rel]);
    assert!(reader.node_exists(b)?);
    reader.close()?;

    let mut fresh = open();
    let fresh_name = fresh.get_or_create_property_key_id("name")?;
    assert_eq!(fresh.get_node_property(a, fresh_name)?, Some(Value::from("bob")));
    assert_eq!(listed(&mut *fresh, a)?, vec![second_rel]);
    assert!(!fresh.node_exists(b)?);
    Ok(())
}

fn node_deleted_elsewhere_lists_nothing((mut writer, mut reader, open): Setup) -> Result<()> {
    let lonely = writer.create_node()?;
    writer.close()?;
    drop(writer);

    // seen as existing before its adjacency is ever loaded
    assert!(reader.node_exists(lonely)?);

    let mut other = open();
    other.delete_node(lonely)?;
    other.close()?;
    drop(other);

    assert!(listed(&mut *reader, lonely)?.is_empty());
    assert!(reader.node_exists(lonely)?);
    reader.close()?;

    let mut fresh = open();
    assert!(!fresh.node_exists(lonely)?);
    assert_eq!(
        listed(&mut *fresh, lonely),
        Err(graphspi::SpiError::NodeNotFound(lonely))
    );
    Ok(())
}

fn own_writes_are_visible((mut ctx, mut other, _open): Setup) -> Result<()> {
    let a = other.create_node()?;
    other.close()?;
    drop(other);

    let t = ctx.get_or_create_relationship_type_id("KNOWS")?;
    assert!(listed(&mut *ctx, a)?.is_empty());
    let b = ctx.create_node()?;
    let rel = ctx.create_relationship(a, b, t)?;
    assert_eq!(listed(&mut *ctx, a)?, vec![rel]);
    assert_eq!(listed(&mut *ctx, b)?, vec![rel]);
    ctx.delete_relationship(rel)?;
    assert!(listed(&mut *ctx, a)?.is_empty());
    Ok(())
}

#[test]
fn kernel_backing_hides_concurrent_writes() -> Result<()> {
    concurrent_writes_stay_invisible(kernel_pair())
}

#[test]
fn graph_db_backing_hides_concurrent_writes() -> Result<()> {
    concurrent_writes_stay_invisible(graph_db_pair())
}

#[test]
fn kernel_backing_lists_nothing_for_vanished_node() -> Result<()> {
    node_deleted_elsewhere_lists_nothing(kernel_pair())
}

#[test]
fn graph_db_backing_lists_nothing_for_vanished_node() -> Result<()> {
    node_deleted_elsewhere_lists_nothing(graph_db_pair())
}

#[test]
fn kernel_backing_sees_own_writes() -> Result<()> {
    own_writes_are_visible(kernel_pair())
}

#[test]
fn graph_db_backing_sees_own_writes() -> Result<()> {
    own_writes_are_visible(graph_db_pair())
}
