use std::sync::Arc;
use std::thread;

use renamer_core::{
    Field, FieldLookup, Plugin, PluginConfig, PluginError, PluginErrorKind, PluginRow, RowEvent,
};
use renamer_plugins::{PluginPipeline, PluginRegistry, SequenceNumber};
use renamer_test_support::fixtures::Workspace;
use renamer_test_support::mocks::RecordingListener;

#[test]
fn configured_pipeline_numbers_and_validates_rows() -> anyhow::Result<()> {
    let workspace = Workspace::new()?;
    for name in ["b.lsm", "a.lsm", "c.lsm"] {
        workspace.write_source(name, name.as_bytes())?;
    }

    let pipeline = PluginRegistry::with_builtins().build(&[
        PluginConfig::new("sequence_number")
            .with("field", "Seq")
            .with("width", "2"),
        PluginConfig::new("required_fields").with("fields", "Batch, Seq"),
        PluginConfig::new("field_pattern")
            .with("field", "Batch")
            .with("pattern", "B[0-9]+"),
    ])?;

    let mut row = workspace.row("c.lsm", vec![Field::new("Batch", "B7"), Field::plugin("Seq")])?;
    let mut view = PluginRow::new(0, &mut row);
    pipeline.dispatch(RowEvent::StartRow, &mut view)?;
    pipeline.validate(&view)?;
    assert_eq!(view.core_value("Seq"), Some("03"));
    assert_eq!(view.destination_file_name(), "B703.lsm");

    let mut rejected = workspace.row("a.lsm", vec![Field::new("Batch", "X1")])?;
    let mut view = PluginRow::new(1, &mut rejected);
    pipeline.dispatch(RowEvent::StartRow, &mut view)?;
    let err = pipeline.validate(&view).expect_err("batch pattern");
    assert_eq!(err.kind(), PluginErrorKind::Data);
    assert_eq!(err.plugin(), "field_pattern");
    Ok(())
}

#[test]
fn externally_registered_kinds_join_the_pipeline() -> anyhow::Result<()> {
    let mut registry = PluginRegistry::with_builtins();
    registry.register("recorder", || Box::new(RecordingListener::new("recorder")));
    let pipeline = registry.build(&[
        PluginConfig::new("recorder"),
        PluginConfig::new("sequence_number").with("field", "Seq"),
    ])?;
    let described: Vec<_> = pipeline
        .describe()
        .map(|(name, roles)| format!("{name}:{}", roles.describe()))
        .collect();
    assert_eq!(
        described,
        [
            "recorder:row-listener,session-listener",
            "sequence_number:row-listener"
        ]
    );
    Ok(())
}

#[test]
fn concurrent_sessions_share_plugin_instances() -> anyhow::Result<()> {
    let workspace = Workspace::new()?;
    let recorder = Arc::new(RecordingListener::new("recorder"));
    let mut sequence = SequenceNumber::default();
    sequence.init(&PluginConfig::new(SequenceNumber::KIND).with("field", "Seq"))?;
    let pipeline = PluginPipeline::from_plugins(vec![recorder.clone(), Arc::new(sequence)]);

    let rows = workspace.batch_rows(&[("a.lsm", "B1"), ("b.lsm", "B1")])?;
    let handles: Vec<_> = (0..2)
        .map(|session| {
            let pipeline = pipeline.clone();
            let mut rows = rows.clone();
            thread::spawn(move || -> Result<Vec<String>, PluginError> {
                let mut values = Vec::new();
                for (index, row) in rows.iter_mut().enumerate() {
                    let mut view = PluginRow::new(session * 10 + index, row);
                    pipeline.dispatch(RowEvent::StartRow, &mut view)?;
                    values.push(view.core_value("Seq").unwrap_or_default().to_string());
                }
                Ok(values)
            })
        })
        .collect();

    for handle in handles {
        let values = handle.join().expect("session thread panicked")?;
        assert_eq!(values, ["001", "002"]);
    }
    assert_eq!(recorder.events().len(), 4);
    Ok(())
}
