use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use regex::Regex;
use script_ext_html::{
  Asset, AssetStore, BuildContext, Chunk, ChunkRole, HintOptions, Options, PatternSet,
  PipelineController, Tag, TagGroups,
};

fn store<S: AsRef<str>>(names: &[S]) -> BTreeMap<String, Asset> {
  names
    .iter()
    .map(|name| {
      let name = name.as_ref();
      (name.to_string(), Asset::new(format!("console.log('{name}')")))
    })
    .collect()
}

fn js() -> PatternSet {
  PatternSet::default().with(Regex::new(r"\.js$").unwrap())
}

proptest! {
  #[test]
  fn inlined_assets_are_never_referenced_externally(
    names in prop::collection::btree_set("(inl|ext)[a-z]{1,4}\\.js", 1..8)
  ) {
    let names: Vec<String> = names.into_iter().collect();
    let assets = store(&names);
    let options = Options {
      inline: PatternSet::default().with("inl"),
      ..Options::default()
    };
    let mut groups = TagGroups {
      head: names.iter().map(|name| Tag::script(name.as_str())).collect(),
      body: Vec::new(),
    };

    let mut controller = PipelineController::new(Arc::new(options));
    controller
      .alter_asset_tags(&mut groups, &assets, &[], &BuildContext::default())
      .unwrap();

    for name in names.iter().filter(|name| name.starts_with("inl")) {
      let expected = format!("console.log('{name}')");
      prop_assert!(groups.head.iter().all(|tag| tag.asset_ref() != Some(name.as_str())));
      let bodies = groups
        .head
        .iter()
        .filter(|tag| tag.inner_html.as_deref() == Some(expected.as_str()))
        .count();
      prop_assert_eq!(bodies, 1);
    }
  }

  #[test]
  fn async_files_get_exactly_one_preload(
    files in prop::collection::vec("[a-c]\\.js", 1..4),
    copies in 1usize..4
  ) {
    let chunks: Vec<Chunk> = (0..copies)
      .map(|index| Chunk {
        id: format!("async-{index}"),
        files: files.clone(),
        role: ChunkRole::Async,
      })
      .collect();
    let options = Options {
      preload: HintOptions::new(js()),
      ..Options::default()
    };
    let mut groups = TagGroups::default();
    let assets: BTreeMap<String, Asset> = BTreeMap::new();

    let mut controller = PipelineController::new(Arc::new(options));
    controller
      .alter_asset_tags(&mut groups, &assets, &chunks, &BuildContext::default())
      .unwrap();

    for file in &files {
      let count = groups
        .head
        .iter()
        .filter(|tag| tag.attributes.text("rel") == Some("preload"))
        .filter(|tag| tag.asset_ref() == Some(file.as_str()))
        .count();
      prop_assert_eq!(count, 1);
    }
  }

  #[test]
  fn emission_without_removal_keeps_every_asset(
    names in prop::collection::btree_set("[a-z]{1,6}\\.js", 0..8)
  ) {
    let names: Vec<String> = names.into_iter().collect();
    let mut assets = store(&names);
    let options = Options {
      inline: PatternSet::default().with(""),
      remove_inlined_assets: false,
      ..Options::default()
    };
    let mut groups = TagGroups {
      head: names.iter().map(|name| Tag::script(name.as_str())).collect(),
      body: Vec::new(),
    };

    let mut controller = PipelineController::new(Arc::new(options));
    controller
      .alter_asset_tags(&mut groups, &assets, &[], &BuildContext::default())
      .unwrap();
    let removed = controller.emit(&mut assets).unwrap();

    prop_assert!(removed.is_empty());
    for name in &names {
      prop_assert!(assets.contains(name));
    }
  }
}

#[test]
fn async_pattern_touches_only_matching_scripts_and_keeps_order() {
  let assets = store(&["a.js", "b.js", "c.js"]);
  let options = Options {
    asynchronous: PatternSet::default().with("a.js"),
    ..Options::default()
  };
  let mut groups = TagGroups {
    head: vec![Tag::script("a.js"), Tag::script("b.js")],
    body: vec![Tag::script("c.js")],
  };
  let before = groups.clone();

  let mut controller = PipelineController::new(Arc::new(options));
  controller
    .alter_asset_tags(&mut groups, &assets, &[], &BuildContext::default())
    .unwrap();

  assert!(groups.head[0].attributes.is_set("async"));
  assert_eq!(groups.head[0].asset_ref(), Some("a.js"));
  assert_eq!(groups.head[1], before.head[1]);
  assert_eq!(groups.body[0], before.body[0]);
}

#[test]
fn initial_preload_precedes_async_preload() {
  let options = Options {
    preload: HintOptions::new(js()),
    ..Options::default()
  };
  let chunks = vec![
    Chunk {
      id: "main".into(),
      files: vec!["x.js".into()],
      role: ChunkRole::Initial,
    },
    Chunk {
      id: "lazy".into(),
      files: vec!["x.js".into(), "y.js".into()],
      role: ChunkRole::Async,
    },
  ];
  let assets = store(&["x.js", "y.js"]);
  let mut groups = TagGroups {
    head: vec![Tag::script("x.js")],
    body: Vec::new(),
  };

  let mut controller = PipelineController::new(Arc::new(options));
  controller
    .alter_asset_tags(&mut groups, &assets, &chunks, &BuildContext::default())
    .unwrap();

  let preloads: Vec<&str> = groups
    .head
    .iter()
    .filter(|tag| tag.attributes.text("rel") == Some("preload"))
    .filter_map(Tag::asset_ref)
    .collect();
  assert_eq!(preloads, vec!["x.js", "y.js"]);
}
