//! Custom attribute groups merged onto matching script elements.

use tracing::debug;

use crate::models::{BuildContext, Tag};
use crate::options::Options;

/// Merge every matching custom attribute group onto the script tags of one list.
///
/// Groups are evaluated in configuration order so later groups win on shared keys.
/// Inlined scripts are matched by the asset they were built from.
pub fn apply_custom_attributes(tags: &[Tag], options: &Options, context: &BuildContext) -> Vec<Tag> {
  tags
    .iter()
    .map(|tag| {
      let mut tag = tag.clone();
      apply_to_tag(&mut tag, options, context);
      tag
    })
    .collect()
}

fn apply_to_tag(tag: &mut Tag, options: &Options, context: &BuildContext) {
  if !tag.is_script() {
    return;
  }
  let name = match (&tag.inlined_from, tag.attributes.text("src")) {
    (Some(name), _) => name.clone(),
    (None, Some(src)) => context.asset_name(src).to_string(),
    (None, None) => return,
  };

  for group in &options.custom {
    if group.test.matches(&name) {
      debug!("applying custom attributes '{}' to '{name}'", group.name);
      let attributes = group.attributes.resolve(&name, tag);
      tag.attributes.merge(&attributes);
    }
  }
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;
  use crate::models::Attributes;
  use crate::options::CustomAttributeGroup;
  use crate::pattern::PatternSet;

  fn options() -> Options {
    Options {
      custom: vec![
        CustomAttributeGroup::new(
          "crossorigin",
          PatternSet::default().with("vendor"),
          Attributes::new()
            .with("crossorigin", "anonymous")
            .with("data-group", "first"),
        ),
        CustomAttributeGroup::new(
          "override",
          PatternSet::default().with(".js"),
          Attributes::new().with("data-group", "second"),
        ),
        CustomAttributeGroup::computed(
          "named",
          PatternSet::default().with("app"),
          |name, _tag| Attributes::new().with("data-asset", name.to_string()),
        ),
      ],
      ..Options::default()
    }
  }

  #[test]
  fn later_groups_overwrite_earlier_keys() {
    let mut tag = Tag::script("vendor.js");
    tag.attributes.set("nonce", "n");

    let updated = apply_custom_attributes(&[tag], &options(), &BuildContext::default());
    let attributes = &updated[0].attributes;

    assert_eq!(attributes.text("crossorigin"), Some("anonymous"));
    assert_eq!(attributes.text("data-group"), Some("second"));
    assert_eq!(attributes.text("nonce"), Some("n"));
    assert_eq!(attributes.text("src"), Some("vendor.js"));
  }

  #[test]
  fn computed_groups_receive_the_asset_name() {
    let context = BuildContext {
      public_path: Some("/assets/".into()),
      hash: false,
    };
    let updated = apply_custom_attributes(&[Tag::script("/assets/app.js")], &options(), &context);
    assert_eq!(updated[0].attributes.text("data-asset"), Some("app.js"));
  }

  #[test]
  fn inlined_scripts_match_by_origin_and_links_are_skipped() {
    let mut inline = Tag::script("placeholder");
    inline.attributes.remove("src");
    inline.inner_html = Some("1".into());
    inline.inlined_from = Some("vendor.js".into());
    let link = Tag::link("preload", "vendor.js");

    let updated =
      apply_custom_attributes(&[inline, link.clone()], &options(), &BuildContext::default());
    assert_eq!(updated[0].attributes.text("crossorigin"), Some("anonymous"));
    assert_eq!(updated[1], link);
  }

  proptest! {
    #[test]
    fn applying_twice_equals_applying_once(
      names in prop::collection::vec("(vendor|app|lib)[a-z]{0,4}\\.(js|css)", 0..8)
    ) {
      let tags: Vec<Tag> = names.iter().map(|name| Tag::script(name.as_str())).collect();
      let options = options();
      let context = BuildContext::default();

      let once = apply_custom_attributes(&tags, &options, &context);
      let twice = apply_custom_attributes(&once, &options, &context);
      prop_assert_eq!(once, twice);
    }
  }
}
