// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gyre_core::test_support::task_proxy;

#[test]
fn lookup_is_by_relative_id() {
    let mut pool = TaskPool::new();
    pool.insert(task_proxy("1", "fetch", "localhost"));
    pool.insert(task_proxy("2", "fetch", "localhost"));

    assert_eq!(pool.len(), 2);
    assert_eq!(pool.get("1/fetch").unwrap().point, "1");
    assert_eq!(pool.get("2/fetch").unwrap().point, "2");
    assert!(pool.get("3/fetch").is_none());
}

#[test]
fn insert_replaces_an_existing_instance() {
    let mut pool = TaskPool::new();
    pool.insert(task_proxy("1", "fetch", "localhost"));

    let mut successor = task_proxy("1", "fetch", "cluster");
    successor.submit_num = 3;
    pool.insert(successor);

    assert_eq!(pool.len(), 1);
    let task = pool.get("1/fetch").unwrap();
    assert_eq!(task.platform_name, "cluster");
    assert_eq!(task.submit_num, 3);
}

#[test]
fn removal_makes_later_lookups_fail() {
    let mut pool = TaskPool::new();
    pool.insert(task_proxy("1", "fetch", "localhost"));

    let removed = pool.remove("1/fetch").unwrap();
    assert_eq!(removed.name, "fetch");
    assert!(pool.get("1/fetch").is_none());
    assert!(pool.is_empty());
}

#[test]
fn ids_keep_insertion_order() {
    let mut pool = TaskPool::new();
    pool.insert(task_proxy("3", "c", "localhost"));
    pool.insert(task_proxy("1", "a", "localhost"));
    pool.insert(task_proxy("2", "b", "localhost"));

    assert_eq!(pool.ids(), vec!["3/c", "1/a", "2/b"]);
}
