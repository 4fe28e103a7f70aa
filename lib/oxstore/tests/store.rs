#![cfg(test)]
#![allow(clippy::panic_in_result_fn)]

use oxstore::{Cursor, Store, StoreOptions, TransactionError};
use oxterm::vocab::xsd;
use oxterm::*;
use std::error::Error;
use std::thread;
use tempfile::TempDir;

fn ex(name: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("http://example.com/{name}"))
}

fn quads(graph_name: impl Into<GraphName>) -> Vec<Quad> {
    let graph_name = graph_name.into();
    vec![
        Quad::new(ex("paris"), ex("type"), ex("City"), graph_name.clone()),
        Quad::new(
            ex("paris"),
            ex("name"),
            Literal::new_language_tagged_literal_unchecked("Paris", "fr"),
            graph_name.clone(),
        ),
        Quad::new(ex("paris"), ex("country"), ex("france"), graph_name.clone()),
        Quad::new(
            ex("paris"),
            ex("population"),
            Literal::new_typed_literal("2000000", NamedNode::new_unchecked(xsd::INTEGER)),
            graph_name.clone(),
        ),
        Quad::new(
            BlankNode::new_unchecked("b0"),
            ex("name"),
            Literal::from("anonymous"),
            graph_name,
        ),
    ]
}

#[test]
fn test_insert_and_read_back() -> Result<(), Box<dyn Error>> {
    let store = Store::new()?;
    let quads = quads(ex("graph"));
    store.extend(&quads)?;
    assert_eq!(store.len(), quads.len());
    for quad in &quads {
        assert!(store.contains(quad));
        let subject = quad.subject.clone();
        let predicate = quad.predicate.clone();
        let object = quad.object.clone();
        let graph_name = quad.graph_name.clone();
        for found in [
            store.quads_for_pattern(Some(&subject), None, None, None),
            store.quads_for_pattern(None, Some(&predicate), None, None),
            store.quads_for_pattern(None, None, Some(&object), None),
            store.quads_for_pattern(None, None, None, Some(&graph_name)),
            store.quads_for_pattern(Some(&subject), Some(&predicate), Some(&object), Some(&graph_name)),
        ] {
            let found = found.into_iter().collect::<Result<Vec<_>, _>>()?;
            assert!(found.contains(quad), "{quad} not found");
        }
    }
    store.validate()?;
    Ok(())
}

#[test]
fn test_insert_remove_round_trip() -> Result<(), Box<dyn Error>> {
    let store = Store::new()?;
    let quad = Quad::new(ex("a"), ex("p"), Literal::from(1), GraphName::DefaultGraph);
    assert!(store.insert(&quad)?);
    assert!(!store.insert(&quad)?);
    assert!(store.remove(&quad)?);
    assert!(!store.remove(&quad)?);
    assert!(!store.contains(&quad));
    assert!(store.is_empty());
    assert!(store.insert(&quad)?);
    assert!(store.contains(&quad));
    store.validate()?;
    Ok(())
}

#[test]
fn test_unknown_terms_match_nothing() -> Result<(), Box<dyn Error>> {
    let store = Store::new()?;
    store.extend(&quads(GraphName::DefaultGraph))?;
    let unknown = ex("unknown");
    assert_eq!(
        store
            .quads_for_pattern(None, Some(&unknown), None, None)
            .into_iter()
            .count(),
        0
    );
    assert!(!store.remove(&Quad::new(
        unknown.clone(),
        unknown.clone(),
        unknown,
        GraphName::DefaultGraph
    ))?);
    Ok(())
}

#[test]
fn test_snapshot_isolation() -> Result<(), Box<dyn Error>> {
    let store = Store::new()?;
    let kept = Quad::new(ex("a"), ex("p"), ex("b"), GraphName::DefaultGraph);
    let removed = Quad::new(ex("a"), ex("p"), ex("c"), GraphName::DefaultGraph);
    store.extend([&kept, &removed])?;

    let before = store.snapshot();
    let mut iter = before.quads_for_pattern(None, None, None, None).into_iter();
    store.remove(&removed)?;
    let added = Quad::new(ex("a"), ex("p"), ex("d"), GraphName::DefaultGraph);
    store.insert(&added)?;

    let mut seen = Vec::new();
    for quad in &mut iter {
        seen.push(quad?);
    }
    seen.sort_by_key(ToString::to_string);
    assert_eq!(seen, vec![kept.clone(), removed.clone()]);
    assert!(before.contains(&removed));
    assert!(!before.contains(&added));

    let after = store.snapshot();
    assert!(after.id() > before.id());
    assert!(!after.contains(&removed));
    assert!(after.contains(&added));
    Ok(())
}

#[test]
fn test_concurrent_reader_and_writer() -> Result<(), Box<dyn Error>> {
    let store = Store::new()?;
    let quad = Quad::new(ex("a"), ex("p"), ex("b"), GraphName::DefaultGraph);

    let reader = store.snapshot();
    let writer = {
        let store = store.clone();
        let quad = quad.clone();
        thread::spawn(move || -> Result<u64, oxstore::StorageError> {
            let mut transaction = store.start_transaction()?;
            transaction.insert(&quad);
            transaction.commit()
        })
    };
    let committed = writer.join().map_err(|_| "writer thread panicked")??;

    assert!(!reader.contains(&quad));
    assert_eq!(reader.quads_for_pattern(None, None, None, None).into_iter().count(), 0);
    let later = store.snapshot();
    assert_eq!(later.id(), committed);
    assert!(later.contains(&quad));
    Ok(())
}

#[test]
fn test_snapshot_is_send() -> Result<(), Box<dyn Error>> {
    let store = Store::new()?;
    store.extend(&quads(GraphName::DefaultGraph))?;
    let snapshot = store.snapshot();
    let handles = (0..4)
        .map(|_| {
            let snapshot = snapshot.clone();
            thread::spawn(move || snapshot.len())
        })
        .collect::<Vec<_>>();
    let mut transaction = store.start_transaction()?;
    transaction.clear(&[]);
    transaction.commit()?;
    for handle in handles {
        assert_eq!(handle.join().map_err(|_| "reader thread panicked")?, 5);
    }
    Ok(())
}

#[test]
fn test_rollback_discards_changes() -> Result<(), Box<dyn Error>> {
    let store = Store::new()?;
    let kept = Quad::new(ex("a"), ex("p"), ex("b"), GraphName::DefaultGraph);
    store.insert(&kept)?;
    let id = store.snapshot().id();

    let mut transaction = store.start_transaction()?;
    transaction.remove(&kept);
    transaction.insert(&Quad::new(ex("a"), ex("p"), ex("c"), GraphName::DefaultGraph));
    transaction.set_namespace("ex", "http://example.com/");
    assert_eq!(transaction.len(), 1);
    transaction.rollback();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.id(), id);
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.contains(&kept));
    assert!(snapshot.namespaces().is_empty());
    store.validate()?;

    // dropping a transaction rolls it back too
    {
        let mut transaction = store.start_transaction()?;
        transaction.clear(&[]);
    }
    assert!(store.contains(&kept));
    store.validate()?;
    Ok(())
}

#[test]
fn test_inferred_statements() -> Result<(), Box<dyn Error>> {
    let store = Store::new()?;
    let quad = Quad::new(ex("a"), ex("type"), ex("Thing"), GraphName::DefaultGraph);

    let mut transaction = store.start_transaction()?;
    assert!(transaction.insert_inferred(&quad));
    assert!(!transaction.insert_inferred(&quad));
    transaction.commit()?;

    let snapshot = store.snapshot();
    assert_eq!(snapshot.size(&[], true), 1);
    assert_eq!(snapshot.size(&[], false), 0);
    assert_eq!(
        snapshot
            .statements(None, None, None, &[], false)
            .into_iter()
            .count(),
        0
    );

    // an explicit insertion upgrades the inferred statement
    assert!(store.insert(&quad)?);
    let snapshot = store.snapshot();
    assert_eq!(snapshot.size(&[], true), 1);
    assert_eq!(snapshot.size(&[], false), 1);

    // an inferred insertion never downgrades an explicit one
    let mut transaction = store.start_transaction()?;
    assert!(!transaction.insert_inferred(&quad));
    assert_eq!(transaction.remove_inferred(None, None, None, &[]), 0);
    transaction.commit()?;
    assert_eq!(store.snapshot().size(&[], false), 1);
    store.validate()?;
    Ok(())
}

#[test]
fn test_contexts() -> Result<(), Box<dyn Error>> {
    let store = Store::new()?;
    store.extend(&quads(GraphName::DefaultGraph))?;
    store.extend(&quads(ex("g1")))?;
    store.extend(&quads(BlankNode::new_unchecked("g2")))?;

    let snapshot = store.snapshot();
    assert_eq!(snapshot.size(&[], false), 15);
    assert_eq!(snapshot.size(&[GraphName::DefaultGraph], false), 5);
    assert_eq!(
        snapshot.size(&[ex("g1").into(), GraphName::DefaultGraph], false),
        10
    );
    assert_eq!(snapshot.size(&[ex("unknown").into()], false), 0);

    let mut contexts = snapshot.context_ids()?;
    contexts.sort_by_key(ToString::to_string);
    assert_eq!(
        contexts,
        vec![
            NamedOrBlankNode::from(ex("g1")),
            NamedOrBlankNode::from(BlankNode::new_unchecked("g2")),
        ]
    );

    let mut transaction = store.start_transaction()?;
    assert_eq!(transaction.clear(&[ex("g1").into()]), 5);
    assert_eq!(transaction.context_ids()?.len(), 1);
    transaction.commit()?;
    assert_eq!(store.len(), 10);
    Ok(())
}

#[test]
fn test_garbage_collection_waits_for_readers() -> Result<(), Box<dyn Error>> {
    let store = Store::with_options(StoreOptions::default().with_gc_on_commit(false))?;
    let quad = Quad::new(ex("a"), ex("p"), ex("b"), GraphName::DefaultGraph);
    store.insert(&quad)?;

    let reader = store.snapshot();
    store.remove(&quad)?;
    assert_eq!(store.collect_garbage()?, 0);
    assert!(reader.contains(&quad));
    assert_eq!(reader.len(), 1);

    drop(reader);
    assert_eq!(store.collect_garbage()?, 1);
    assert_eq!(store.collect_garbage()?, 0);
    assert!(store.is_empty());
    store.validate()?;
    Ok(())
}

#[test]
fn test_closed_cursor_releases_its_snapshot() -> Result<(), Box<dyn Error>> {
    let store = Store::with_options(StoreOptions::default().with_gc_on_commit(false))?;
    let quad = Quad::new(ex("a"), ex("p"), ex("b"), GraphName::DefaultGraph);
    store.insert(&quad)?;

    let mut cursor = store.quads_for_pattern(None, None, None, None);
    store.remove(&quad)?;
    assert_eq!(store.collect_garbage()?, 0);
    cursor.close();
    assert_eq!(cursor.next()?, None);
    assert_eq!(store.collect_garbage()?, 1);
    Ok(())
}

#[test]
fn test_namespaces() -> Result<(), Box<dyn Error>> {
    let store = Store::new()?;
    let mut transaction = store.start_transaction()?;
    transaction.set_namespace("ex", "http://example.com/");
    transaction.set_namespace("schema", "http://schema.org/");
    transaction.remove_namespace("schema");
    assert_eq!(
        transaction.namespace("ex").as_deref(),
        Some("http://example.com/")
    );
    assert!(store.snapshot().namespaces().is_empty());
    transaction.commit()?;
    assert_eq!(
        store.snapshot().namespace("ex").as_deref(),
        Some("http://example.com/")
    );
    assert_eq!(store.snapshot().namespace("schema"), None);

    let mut transaction = store.start_transaction()?;
    transaction.clear_namespaces();
    transaction.commit()?;
    assert!(store.snapshot().namespaces().is_empty());
    Ok(())
}

#[test]
fn test_connection_protocol() -> Result<(), Box<dyn Error>> {
    let store = Store::new()?;
    let quad = Quad::new(ex("a"), ex("p"), ex("b"), GraphName::DefaultGraph);
    let mut connection = store.connection();

    assert!(matches!(connection.add(&quad), Err(TransactionError::NotActive)));
    assert!(matches!(connection.commit(), Err(TransactionError::NotActive)));
    assert!(matches!(connection.rollback(), Err(TransactionError::NotActive)));
    assert!(matches!(
        connection.set_namespace("ex", "http://example.com/"),
        Err(TransactionError::NotActive)
    ));

    connection.begin()?;
    assert!(matches!(connection.begin(), Err(TransactionError::AlreadyActive)));
    assert!(connection.is_active());
    assert!(connection.add(&quad)?);
    assert_eq!(connection.size(&[]), 1);
    assert_eq!(
        connection
            .get_statements(None, None, None, &[], true)
            .into_iter()
            .count(),
        1
    );
    connection.rollback()?;
    assert!(!connection.is_active());
    assert_eq!(connection.size(&[]), 0);

    connection.begin()?;
    connection.add(&quad)?;
    connection.commit()?;
    assert!(store.contains(&quad));

    connection.begin()?;
    assert_eq!(connection.remove(None, Some(&ex("p")), None, &[])?, 1);
    drop(connection);
    assert!(store.contains(&quad));
    Ok(())
}

#[test]
fn test_persistent_store() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let quads = quads(ex("graph"));
    let inferred = Quad::new(ex("paris"), ex("type"), ex("Place"), GraphName::DefaultGraph);
    let discarded = Quad::new(ex("a"), ex("p"), ex("b"), GraphName::DefaultGraph);
    let snapshot = {
        let store = Store::open(dir.path())?;
        store.extend(&quads)?;
        store.remove(&quads[0])?;
        let mut transaction = store.start_transaction()?;
        transaction.insert_inferred(&inferred);
        transaction.set_namespace("ex", "http://example.com/");
        transaction.commit()?;
        let mut transaction = store.start_transaction()?;
        transaction.insert(&discarded);
        transaction.rollback();
        store.snapshot().id()
    };

    let store = Store::open(dir.path())?;
    store.validate()?;
    let reopened = store.snapshot();
    assert_eq!(reopened.id(), snapshot);
    assert!(!reopened.contains(&quads[0]));
    for quad in &quads[1..] {
        assert!(reopened.contains(quad));
    }
    assert!(!reopened.contains(&discarded));
    assert_eq!(reopened.size(&[], true), quads.len());
    assert_eq!(reopened.size(&[], false), quads.len() - 1);
    assert_eq!(reopened.namespaces().len(), 1);
    drop(reopened);

    store.compact()?;
    store.insert(&discarded)?;
    drop(store);
    let store = Store::open(dir.path())?;
    store.validate()?;
    assert_eq!(store.len(), quads.len() + 1);
    assert!(store.contains(&discarded));
    assert_eq!(store.snapshot().size(&[], false), quads.len());
    Ok(())
}

#[test]
fn test_directory_is_locked_while_open() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let first = Quad::new(ex("a"), ex("p"), ex("b"), GraphName::DefaultGraph);
    let second = Quad::new(ex("a"), ex("p"), ex("c"), GraphName::DefaultGraph);
    let store = Store::open(dir.path())?;
    assert!(matches!(
        Store::open(dir.path()),
        Err(oxstore::StorageError::Locked(_))
    ));
    store.insert(&first)?;
    store.compact()?;
    assert!(matches!(
        Store::open(dir.path()),
        Err(oxstore::StorageError::Locked(_))
    ));
    store.insert(&second)?;
    drop(store);

    let store = Store::open(dir.path())?;
    assert_eq!(store.len(), 2);
    assert!(store.contains(&first));
    assert!(store.contains(&second));
    Ok(())
}

#[test]
fn test_writers_are_serialized() -> Result<(), Box<dyn Error>> {
    let store = Store::new()?;
    let handles = (0..8)
        .map(|i| {
            let store = store.clone();
            thread::spawn(move || -> Result<(), oxstore::StorageError> {
                for j in 0..10 {
                    store.insert(&Quad::new(
                        ex(&format!("s{i}")),
                        ex("p"),
                        Literal::from(j),
                        GraphName::DefaultGraph,
                    ))?;
                }
                Ok(())
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().map_err(|_| "writer thread panicked")??;
    }
    assert_eq!(store.len(), 80);
    assert_eq!(store.snapshot().id(), 80);
    store.validate()?;
    Ok(())
}
