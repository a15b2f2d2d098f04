//! Scenarios against a real Node.js install. Each test returns early when
//! Node is not on PATH.

use anyhow::Result;
use execjs::{registry, DeliveryMode, Descriptor, Error, ExternalRuntime};
use serde_json::json;

#[tokio::test]
async fn node_evaluates_expressions() -> Result<()> {
    let node = registry::node();
    if !node.is_available() {
        println!("node not found on PATH; skipping");
        return Ok(());
    }

    assert_eq!(node.eval("1+1").await?, json!(2));
    assert_eq!(
        node.eval("'red yellow blue'.split(' ')").await?,
        json!(["red", "yellow", "blue"])
    );
    assert_eq!(node.eval("").await?, serde_json::Value::Null);
    assert_eq!(node.exec("var x = 1;").await?, serde_json::Value::Null);
    Ok(())
}

#[tokio::test]
async fn node_calls_functions_from_header() -> Result<()> {
    let node = registry::node();
    if !node.is_available() {
        return Ok(());
    }

    let ctx = node.compile("function foo(){ return 'bar' }")?;
    assert_eq!(ctx.call("foo", &[]).await?, json!("bar"));

    let ctx = node.compile("function add(a, b) { return a + b }")?;
    assert_eq!(ctx.call("add", &[json!(2), json!(3)]).await?, json!(5));
    Ok(())
}

#[tokio::test]
async fn node_round_trips_unicode() -> Result<()> {
    let node = registry::node();
    if !node.is_available() {
        return Ok(());
    }

    assert_eq!(node.eval("'café ☕'").await?, json!("café ☕"));
    Ok(())
}

#[tokio::test]
async fn node_reports_thrown_errors() -> Result<()> {
    let node = registry::node();
    if !node.is_available() {
        return Ok(());
    }

    match node.exec("throw new Error('boom')").await {
        Err(Error::ProgramError(value)) => assert_eq!(value, json!("Error: boom")),
        other => panic!("unexpected: {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn node_evaluates_encoded_source_from_a_temp_file() -> Result<()> {
    let node = registry::node();
    if !node.is_available() {
        return Ok(());
    }

    let encoded = ExternalRuntime::new(
        Descriptor::new(
            "Node (encoded source)",
            node.descriptor().command.clone(),
            "var r = eval(#{encoded_source}); console.log(JSON.stringify(['ok', r]));",
        )
        .mode(DeliveryMode::TempFile),
    );

    assert_eq!(encoded.exec("return 1+1").await?, json!(2));
    assert_eq!(encoded.exec("return 'café 😀'").await?, json!("café 😀"));
    Ok(())
}
