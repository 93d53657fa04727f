#[path = "store_utils.rs"]
mod store_utils;

use docmapper::models::promote_vips;
use docmapper::{
    Character, DocError, Document, Entity, FieldState, SessionState, UnitOfWork, User,
};
use serde_json::json;
use store_utils::{kim, lee, sqlite_engine};

#[tokio::test]
async fn test_failed_commit_rolls_back_and_closes_session() -> anyhow::Result<()> {
    let (_dir, mut engine) = sqlite_engine().await?;
    {
        let mut session = engine.session();
        let mut alice = Character::new("alice", Some(Document::new(json!({"age": 28}))));
        let mut bob = Character::new("bob", Some(Document::new(json!({"age": 25}))));
        let mut work = UnitOfWork::new();
        work.save(&mut alice).save(&mut bob);
        session.commit(work).await?;
    }

    let mut session = engine.session();
    let mut bob = session.get::<Character>("bob").await?;
    let stored = bob.data.value().cloned().expect("data");
    bob.data.replace(stored.with_value("age", 26)?);
    let mut duplicate = Character::new("alice", Some(Document::new(json!({"age": 99}))));

    let mut work = UnitOfWork::new();
    work.save(&mut bob).save(&mut duplicate);
    let err = session.commit(work).await.unwrap_err();
    assert!(err.is_backend(), "unexpected error: {}", err);

    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(
        session.all::<Character>().await,
        Err(DocError::SessionClosed)
    ));
    drop(session);

    // Pending value discarded, stored baseline intact.
    assert_eq!(bob.data.state(), FieldState::Clean);
    assert_eq!(bob.data.value(), Some(&stored));
    // The unsaved record keeps what the caller gave it.
    assert!(!duplicate.is_persisted());
    assert_eq!(duplicate.data.value().and_then(|d| d.integer("age")), Some(99));

    let mut session = engine.session();
    let bob = session.get::<Character>("bob").await?;
    let alice = session.get::<Character>("alice").await?;
    assert_eq!(bob.data.value().and_then(|d| d.integer("age")), Some(25));
    assert_eq!(alice.data.value().and_then(|d| d.integer("age")), Some(28));
    Ok(())
}

#[tokio::test]
async fn test_explicit_rollback_discards_statements() -> anyhow::Result<()> {
    let (_dir, mut engine) = sqlite_engine().await?;
    let mut session = engine.session();
    session.commit_one(&mut kim()).await?;

    assert_eq!(session.delete_all::<User>().await?, 1);
    assert_eq!(session.state(), SessionState::InTransaction);
    session.rollback().await?;
    assert_eq!(session.state(), SessionState::Idle);

    assert_eq!(session.all::<User>().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_discarded_work_restores_baselines() -> anyhow::Result<()> {
    let (_dir, mut engine) = sqlite_engine().await?;
    let mut session = engine.session();
    session.commit_one(&mut kim()).await?;

    let mut user = session.find_first::<User>("name", "kim").await?.expect("kim");
    let original = user.settings.value().cloned();
    user.settings.clear();

    let mut work = UnitOfWork::new();
    work.save(&mut user);
    assert!(work.has_changes());
    work.discard();

    assert_eq!(user.settings.value().cloned(), original);
    assert!(!user.has_pending());
    Ok(())
}

#[tokio::test]
async fn test_dropped_session_is_rolled_back() -> anyhow::Result<()> {
    let (_dir, mut engine) = sqlite_engine().await?;
    {
        let mut session = engine.session();
        session.commit_one(&mut kim()).await?;
        session.commit_one(&mut lee()).await?;
    }
    {
        let mut session = engine.session();
        session.delete_all::<User>().await?;
        // dropped without commit
    }

    let mut session = engine.session();
    assert_eq!(session.all::<User>().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_clean_records_issue_no_statements() -> anyhow::Result<()> {
    let (_dir, mut engine) = sqlite_engine().await?;
    let mut session = engine.session();
    session.commit_one(&mut kim()).await?;

    let mut user = session.find_first::<User>("name", "kim").await?.expect("kim");
    let summary = session.commit_one(&mut user).await?;
    assert!(summary.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_bulk_update_counts_exactly() -> anyhow::Result<()> {
    let (_dir, mut engine) = sqlite_engine().await?;
    {
        let mut session = engine.session();
        let mut records = vec![
            Character::new("knight", Some(Document::new(json!({"level": 12})))),
            Character::new("mage", Some(Document::new(json!({"level": 10, "class": "mage"})))),
            Character::new("squire", Some(Document::new(json!({"level": 3})))),
            Character::new("ghost", None),
        ];
        let mut work = UnitOfWork::new();
        work.save_all(records.iter_mut());
        session.commit(work).await?;
    }

    let mut session = engine.session();
    assert_eq!(promote_vips(&mut session, 10).await?, 2);
    assert_eq!(promote_vips(&mut session, 10).await?, 0);

    let vips = session
        .filter::<Character>(|c| c.data.value().is_some_and(|d| d.boolean("vip") == Some(true)))
        .await?;
    let mut names: Vec<_> = vips.iter().map(|c| c.name().to_string()).collect();
    names.sort();
    assert_eq!(names, vec!["knight", "mage"]);

    let mage = session.get::<Character>("mage").await?;
    let data = mage.data.value().expect("data");
    assert!(data.str("vip_since").is_some());
    assert_eq!(data.str("class"), Some("mage"));
    Ok(())
}

#[tokio::test]
async fn test_update_where_with_custom_change() -> anyhow::Result<()> {
    let (_dir, mut engine) = sqlite_engine().await?;
    let mut session = engine.session();
    session.commit_one(&mut kim()).await?;
    session.commit_one(&mut lee()).await?;

    let altered = session
        .update_where::<User>(|user| {
            let next = user
                .settings
                .value()
                .filter(|s| s.str("theme") == Some("light"))
                .map(|s| s.with_value("theme", "dark"));
            if let Some(Ok(next)) = next {
                user.settings.replace(next);
            }
        })
        .await?;
    assert_eq!(altered, 1);

    let users = session.all::<User>().await?;
    assert!(users
        .iter()
        .all(|u| u.settings.value().and_then(|s| s.str("theme")) == Some("dark")));
    Ok(())
}
