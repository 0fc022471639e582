use kitchenhub_lib::{
    model::{NewPantryItem, PantryCategory, PantrySource, PANTRY_DUPLICATE, PANTRY_NO_LOW_STOCK},
    Collection,
};
use serde_json::{Map, Value};

mod support;
use support::Sent;

fn eggs() -> NewPantryItem {
    NewPantryItem {
        id: None,
        name: "Eggs".into(),
        quantity: "2 dozen".into(),
        category: PantryCategory::Fridge,
        source: PantrySource::Costco,
        notes: None,
    }
}

#[tokio::test]
async fn adding_an_item_starts_in_stock_with_a_fresh_id() {
    let (store, _port) = support::setup_store().await;

    let mut input = eggs();
    input.id = Some("client-chosen".into());
    let item = store.add_pantry_item(input).await.expect("add item");
    assert_ne!(item.id, "client-chosen", "caller ids are discarded");
    assert!(!item.low_stock);
    assert_eq!(item.category, PantryCategory::Fridge);
}

#[tokio::test]
async fn duplicate_name_and_source_is_a_conflict() {
    let (store, _port) = support::setup_store().await;

    store.add_pantry_item(eggs()).await.expect("first insert");
    let err = store
        .add_pantry_item(eggs())
        .await
        .expect_err("same name and source");
    assert_eq!(err.code(), PANTRY_DUPLICATE);

    let mut other_source = eggs();
    other_source.source = PantrySource::Other;
    store
        .add_pantry_item(other_source)
        .await
        .expect("same name, different source");

    assert_eq!(
        store
            .gateway()
            .select_pantry_items()
            .await
            .expect("select")
            .len(),
        2
    );
}

#[tokio::test]
async fn low_stock_toggle_alerts_the_designated_member_once() {
    let (store, port) = support::setup_store().await;
    store
        .add_family_member("Shingo", "shingo@example.com", None, None)
        .await
        .expect("add member");
    let item = store.add_pantry_item(eggs()).await.expect("add item");
    store.load_all().await;
    port.clear();

    let now_low = store.toggle_low_stock(&item.id).await.expect("toggle on");
    assert!(now_low);
    let items = store.gateway().select_pantry_items().await.expect("select");
    assert!(items[0].low_stock);

    let emails = port.emails();
    assert_eq!(emails.len(), 1, "exactly one alert");
    let Sent::Email { to, subject, html } = &emails[0] else {
        unreachable!()
    };
    assert_eq!(to, &vec!["shingo@example.com".to_string()]);
    assert_eq!(subject, "Low Stock Alert: Eggs");
    assert!(html.contains("2 dozen"));

    // Toggling back reverts the flag with no further alert.
    store.load_all().await;
    port.clear();
    let now_low = store.toggle_low_stock(&item.id).await.expect("toggle off");
    assert!(!now_low);
    assert!(port.emails().is_empty());
    let items = store.gateway().select_pantry_items().await.expect("select");
    assert!(!items[0].low_stock);
}

#[tokio::test]
async fn low_stock_alert_is_skipped_without_the_designated_member() {
    let (store, port) = support::setup_store().await;
    store
        .add_family_member("Aki", "aki@example.com", None, None)
        .await
        .expect("add member");
    let item = store.add_pantry_item(eggs()).await.expect("add item");
    store.load_all().await;
    port.clear();

    let now_low = store.toggle_low_stock(&item.id).await.expect("toggle");
    assert!(now_low, "flag still flips");
    assert!(port.emails().is_empty());
}

#[tokio::test]
async fn low_stock_alert_failure_stays_silent() {
    let (store, port) = support::setup_store().await;
    store
        .add_family_member("Shingo", "shingo@example.com", None, None)
        .await
        .expect("add member");
    let item = store.add_pantry_item(eggs()).await.expect("add item");
    store.load_all().await;

    port.set_failing(true);
    let now_low = store
        .toggle_low_stock(&item.id)
        .await
        .expect("toggle succeeds despite the dead provider");
    assert!(now_low);
}

#[tokio::test]
async fn shopping_list_requires_low_stock_items() {
    let (store, _port) = support::setup_store().await;
    store.add_pantry_item(eggs()).await.expect("add item");
    store.load_all().await;

    let err = store
        .send_shopping_list(&["aki@example.com".into()])
        .await
        .expect_err("nothing is low");
    assert_eq!(err.code(), PANTRY_NO_LOW_STOCK);
}

#[tokio::test]
async fn shopping_list_goes_to_every_target_grouped_by_category() {
    let (store, port) = support::setup_store().await;
    let items = [
        ("Eggs", PantryCategory::Fridge),
        ("Peas", PantryCategory::Freezer),
        ("Rice", PantryCategory::Pantry),
    ];
    for (name, category) in items {
        let created = store
            .add_pantry_item(NewPantryItem {
                id: None,
                name: name.into(),
                quantity: "1".into(),
                category,
                source: PantrySource::Other,
                notes: None,
            })
            .await
            .expect("add item");
        store.load_all().await;
        store
            .toggle_low_stock(&created.id)
            .await
            .expect("mark low");
    }
    store.load_all().await;
    port.clear();

    let targets = ["aki@example.com".to_string(), "mika@example.com".to_string()];
    store
        .send_shopping_list(&targets)
        .await
        .expect("send list");

    let emails = port.emails();
    assert_eq!(emails.len(), 2, "one send per target address");
    let Sent::Email { subject, html, .. } = &emails[0] else {
        unreachable!()
    };
    assert_eq!(subject, "Kitchen Hub Shopping List");
    let freezer = html.find("Freezer").expect("freezer section");
    let fridge = html.find("Fridge").expect("fridge section");
    let pantry = html.find("Pantry").expect("pantry section");
    assert!(freezer < fridge && fridge < pantry);
    assert!(html.contains("Eggs"));
}

#[tokio::test]
async fn edits_and_deletes_pass_through() {
    let (store, _port) = support::setup_store().await;
    let item = store.add_pantry_item(eggs()).await.expect("add item");

    let mut patch = Map::new();
    patch.insert("quantity".into(), Value::from("1 dozen"));
    store
        .gateway()
        .update(Collection::PantryItems, &item.id, patch)
        .await
        .expect("gateway update");

    store
        .edit_pantry_item(
            &item.id,
            kitchenhub_lib::model::PantryItemPatch {
                notes: Some("buy the big box".into()),
                ..Default::default()
            },
        )
        .await
        .expect("store edit");

    let items = store.gateway().select_pantry_items().await.expect("select");
    assert_eq!(items[0].quantity, "1 dozen");
    assert_eq!(items[0].notes.as_deref(), Some("buy the big box"));

    store.delete_pantry_item(&item.id).await.expect("delete");
    assert!(store
        .gateway()
        .select_pantry_items()
        .await
        .expect("select")
        .is_empty());
}
