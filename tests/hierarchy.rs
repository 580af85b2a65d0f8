//! Directory-tree behaviour over the in-process store
//!
//! Tests listing, copying, moving and deleting trees through handles.

mod common;

use std::sync::Arc;

use bucket_fs::driver::Driver;
use bucket_fs::node::{Directory, File, FileNode, LocalDirectory, LocalFile, Node};
use bucket_fs::{BucketFsError, Result};
use common::*;

#[tokio::test]
async fn test_nested_files_and_directories() -> Result<()> {
    let harness = TestHarness::new().await;
    harness
        .seed(&[("a/b/c.txt", "c"), ("a/b/d.txt", "dd")])
        .await;

    let b = harness.root().directory("a/b");
    let files = b.files(false).await?;
    assert_eq!(paths(&files, |f| f.basename().to_string()), ["c.txt", "d.txt"]);

    let a = harness.root().directory("a");
    let directories = a.directories(true).await?;
    assert_eq!(paths(&directories, |d| d.path()), ["a/b"]);
    assert!(!directories.iter().any(|d| d.path() == "a"));

    assert_eq!(a.size().await?, 3);
    Ok(())
}

#[tokio::test]
async fn test_items_distinguish_markers_from_files() -> Result<()> {
    let harness = TestHarness::new().await;
    harness
        .seed(&[("docs/", ""), ("docs/guide/", ""), ("docs/readme.md", "hi")])
        .await;

    let items = harness.root().directory("docs").items(false).await?;
    let mut seen: Vec<(String, bool)> = items.iter().map(|n| (n.path(), n.is_dir())).collect();
    seen.sort();
    assert_eq!(
        seen,
        [
            ("docs/guide".to_string(), true),
            ("docs/readme.md".to_string(), false)
        ]
    );

    let all = harness.root().items(true).await?;
    assert!(all
        .iter()
        .any(|n| matches!(n, Node::Directory(d) if d.path() == "docs/guide")));
    Ok(())
}

#[tokio::test]
async fn test_existence_lifecycle() -> Result<()> {
    let harness = TestHarness::new().await;
    let dir = harness.root().directory("photos");
    let file = dir.file("cat.jpg");

    assert!(!dir.exists().await?);
    assert!(!file.exists().await?);
    assert_eq!(file.size().await?, 0);

    assert!(dir.make().await?);
    assert!(dir.exists().await?);

    assert!(file.write("meow").await?);
    assert!(file.exists().await?);
    assert_eq!(file.size().await?, 4);
    assert_eq!(file.parent().path(), "photos");

    file.delete().await?;
    assert!(!file.exists().await?);
    assert!(dir.exists().await?);

    assert!(dir.delete().await?);
    assert!(!dir.exists().await?);
    Ok(())
}

#[tokio::test]
async fn test_directory_exists_through_its_contents() -> Result<()> {
    let harness = TestHarness::new().await;
    harness.seed(&[("implicit/deep/file.bin", "x")]).await;

    assert!(harness.root().directory("implicit").exists().await?);
    assert!(harness.root().directory("implicit/deep").exists().await?);
    assert!(!harness.root().directory("impl").exists().await?);
    assert!(harness.root().exists().await?);
    Ok(())
}

#[tokio::test]
async fn test_read_range() -> Result<()> {
    let harness = TestHarness::new().await;
    let file = harness.file("log.txt");
    file.write("0123456789").await?;

    assert_eq!(&file.read_range(Some(2), Some(4)).await?[..], b"234");
    assert_eq!(&file.read_range(Some(7), None).await?[..], b"789");
    assert_eq!(&file.read().await?[..], b"0123456789");
    Ok(())
}

#[tokio::test]
async fn test_copy_directory_tree() -> Result<()> {
    let harness = TestHarness::new().await;
    harness
        .seed(&[("src/a.txt", "a"), ("src/sub/b.txt", "b"), ("src/empty/", "")])
        .await;

    let src = harness.root().directory("src");
    let dst = harness.root().directory("dst");
    src.copy_to(&dst).await?;

    let keys = harness.keys();
    for key in ["dst/", "dst/a.txt", "dst/empty/", "dst/sub/", "dst/sub/b.txt"] {
        assert!(keys.contains(&key.to_string()), "missing {}", key);
    }
    assert!(keys.contains(&"src/a.txt".to_string()));
    assert_eq!(&harness.file("dst/sub/b.txt").read().await?[..], b"b");
    Ok(())
}

#[tokio::test]
async fn test_move_and_rename_directory() -> Result<()> {
    let harness = TestHarness::new().await;
    harness
        .seed(&[("old/a.txt", "a"), ("old/sub/b.txt", "b"), ("old/", "")])
        .await;

    let mut dir = harness.root().directory("old");
    dir.rename("new").await?;
    assert_eq!(dir.path(), "new");

    let keys = harness.keys();
    assert!(!keys.iter().any(|k| k.starts_with("old/")), "{:?}", keys);
    assert!(keys.contains(&"new/sub/b.txt".to_string()));
    assert_eq!(dir.files(true).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_delete_recursive_removes_markers() -> Result<()> {
    let harness = TestHarness::new().await;
    harness
        .seed(&[
            ("tmp/", ""),
            ("tmp/x/", ""),
            ("tmp/x/y/", ""),
            ("tmp/x/y/z.txt", "z"),
            ("keep.txt", "k"),
        ])
        .await;

    harness.root().directory("tmp").delete_recursive().await?;
    assert_eq!(harness.keys(), ["keep.txt"]);
    Ok(())
}

#[tokio::test]
async fn test_file_rename_follows_handle() -> Result<()> {
    let harness = TestHarness::new().await;
    let mut file = harness.file("inbox/draft.txt");
    file.write("body").await?;

    file.rename("final.txt").await?;
    assert_eq!(file.path(), "inbox/final.txt");
    assert_eq!(harness.keys(), ["inbox/final.txt"]);

    // Renaming onto itself keeps the content
    file.rename("final.txt").await?;
    assert_eq!(&file.read().await?[..], b"body");
    Ok(())
}

#[tokio::test]
async fn test_failed_move_keeps_source() -> Result<()> {
    let harness = TestHarness::new().await;
    let source = harness.file("inbox/report.pdf");
    source.write("pdf").await?;

    harness.store.fail_puts_under("archive/");
    let target = harness.file("archive/report.pdf");
    let err = source.move_to(&target).await.unwrap_err();
    assert!(err.is_not_found());

    assert!(source.exists().await?);
    assert_eq!(&source.read().await?[..], b"pdf");
    assert!(!target.exists().await?);

    harness.store.clear_failures();
    source.move_to(&target).await?;
    assert!(!source.exists().await?);
    assert_eq!(&target.read().await?[..], b"pdf");
    Ok(())
}

#[tokio::test]
async fn test_copy_between_buckets_is_staged() -> Result<()> {
    let harness = TestHarness::new().await;
    let backup = harness.bucket("backup").await;
    let source = harness.file("data.csv");
    source.write("a,b\n1,2\n").await?;

    let target = File::new("data.csv").with_driver(backup.clone());
    source.copy_to(&target).await?;
    assert_eq!(&target.read().await?[..], b"a,b\n1,2\n");
    assert!(source.exists().await?);

    // Another bucket in the same store: a real move
    let moved = File::new("moved.csv").with_driver(backup);
    target.move_to(&moved).await?;
    assert!(!target.exists().await?);
    assert!(moved.exists().await?);
    Ok(())
}

#[tokio::test]
async fn test_local_round_trips() -> Result<()> {
    let harness = TestHarness::new().await;
    let tmp = tempfile::tempdir()?;

    let local = LocalFile::new(tmp.path().join("upload.txt"));
    FileNode::write(&local, "from disk".into()).await?;

    let remote = harness.file("uploads/upload.txt");
    remote.copy_from(&local).await?;
    assert_eq!(&remote.read().await?[..], b"from disk");

    let back = LocalFile::new(tmp.path().join("download.txt"));
    remote.copy_to(&back).await?;
    assert_eq!(std::fs::read(back.as_path())?, b"from disk");

    // Moving to disk removes the object
    let moved = LocalFile::new(tmp.path().join("moved.txt"));
    remote.move_to(&moved).await?;
    assert!(!remote.exists().await?);
    assert!(moved.as_path().exists());
    Ok(())
}

#[tokio::test]
async fn test_copy_tree_to_local_directory() -> Result<()> {
    let harness = TestHarness::new().await;
    harness
        .seed(&[("site/index.html", "<html>"), ("site/css/main.css", "body{}"), ("site/img/", "")])
        .await;
    let tmp = tempfile::tempdir()?;
    let target = LocalDirectory::new(tmp.path().join("site"));

    harness.root().directory("site").copy_to(&target).await?;

    assert_eq!(std::fs::read(tmp.path().join("site/index.html"))?, b"<html>");
    assert_eq!(std::fs::read(tmp.path().join("site/css/main.css"))?, b"body{}");
    assert!(tmp.path().join("site/img").is_dir());
    Ok(())
}

#[tokio::test]
async fn test_unbound_directory_is_unresolved() {
    let dir = Directory::new("nowhere");
    assert!(matches!(
        dir.files(false).await,
        Err(BucketFsError::DriverUnresolved(_))
    ));
}

#[tokio::test]
async fn test_move_into_own_subtree_is_rejected() -> Result<()> {
    let harness = TestHarness::new().await;
    harness.seed(&[("a/x.txt", "x"), ("a/y/z.txt", "z")]).await;
    let a = harness.root().directory("a");

    let err = a.move_to(&a.directory("inner")).await.unwrap_err();
    assert!(matches!(err, BucketFsError::TargetInsideSource { .. }));
    assert_eq!(harness.keys(), ["a/x.txt", "a/y/z.txt"]);

    assert!(a.copy_to(&a).await.is_err());
    assert!(harness.root().copy_to(&a).await.is_err());
    assert_eq!(harness.keys(), ["a/x.txt", "a/y/z.txt"]);

    // A sibling sharing the name prefix is not inside
    a.copy_to(&harness.root().directory("ab")).await?;
    assert!(harness.keys().contains(&"ab/y/z.txt".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_failed_directory_move_keeps_source() -> Result<()> {
    let harness = TestHarness::new().await;
    harness
        .seed(&[("src/", ""), ("src/a.txt", "a"), ("src/sub/b.txt", "b")])
        .await;
    let before = harness.keys();
    let src = harness.root().directory("src");

    // The second file cannot be written
    harness.store.fail_puts_under("dst/sub/b.txt");
    let err = src.move_to(&harness.root().directory("dst")).await.unwrap_err();
    assert!(err.is_not_found());
    for key in &before {
        assert!(harness.keys().contains(key), "lost {}", key);
    }
    // Copies made before the failure stay where they are
    assert!(harness.keys().contains(&"dst/a.txt".to_string()));

    // The destination directory itself cannot be created
    harness.store.clear_failures();
    harness.store.fail_puts_under("elsewhere/");
    let err = src
        .move_to(&harness.root().directory("elsewhere"))
        .await
        .unwrap_err();
    assert!(matches!(err, BucketFsError::CannotCreate(ref p) if p == "elsewhere"));
    for key in &before {
        assert!(harness.keys().contains(key), "lost {}", key);
    }
    Ok(())
}

#[tokio::test]
async fn test_move_between_stores_with_same_bucket_and_key() -> Result<()> {
    let here = TestHarness::new().await;
    let there = TestHarness::new().await;
    let source = here.file("doc.txt");
    source.write("v1").await?;

    let target = there.file("doc.txt");
    source.move_to(&target).await?;

    assert!(here.keys().is_empty());
    assert_eq!(there.keys(), ["doc.txt"]);
    assert_eq!(&target.read().await?[..], b"v1");
    Ok(())
}

#[tokio::test]
async fn test_move_onto_itself_through_another_connection() -> Result<()> {
    let harness = TestHarness::new().await;
    let source = harness.file("doc.txt");
    source.write("keep").await?;

    let reconnected = Arc::new(Driver::connect(configuration(), BUCKET, &harness.store).await?);
    let same = File::new("doc.txt").with_driver(reconnected);
    source.move_to(&same).await?;

    assert_eq!(harness.keys(), ["doc.txt"]);
    assert_eq!(&same.read().await?[..], b"keep");
    Ok(())
}
