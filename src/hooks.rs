//! Registration of the plugin against the host pipeline's hooks.
//!
//! Hosts expose one of two registration conventions: typed hooks, where each hook has
//! its own tap method, or the legacy event-name API with completion callbacks. The
//! convention is probed once when the plugin is applied; the handlers behind both drive
//! the same [`PipelineController`].

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{Dispatch, debug};

use crate::assets::AssetStore;
use crate::error::PluginError;
use crate::models::{BuildContext, Chunk, TagGroups};
use crate::options::Options;
use crate::pipeline::PipelineController;

/// Name the plugin registers its hooks under.
pub const PLUGIN_NAME: &str = "ScriptExtHtmlPlugin";

/// Legacy event fired when a build starts.
pub const COMPILATION_EVENT: &str = "compilation";
/// Legacy event fired once per generated document.
pub const ALTER_ASSET_TAGS_EVENT: &str = "html-webpack-plugin-alter-asset-tags";
/// Legacy event fired when output assets are finalised.
pub const EMIT_EVENT: &str = "emit";

/// Controller shared by the handlers registered for one plugin application.
pub type SharedController = Rc<RefCell<PipelineController>>;

/// Arguments handed to the tag-alteration hook for one document.
pub struct AlterTagsArgs<'a> {
  /// Head and body tags, rewritten in place.
  pub groups: &'a mut TagGroups,
  /// Option context of the document being generated.
  pub context: BuildContext,
  /// Chunk graph of the build.
  pub chunks: &'a [Chunk],
  /// Output assets, read-only during tag alteration.
  pub assets: &'a dyn AssetStore,
  /// Shared error collection of the build.
  pub errors: &'a mut Vec<PluginError>,
}

/// Arguments handed to the emission hook.
pub struct EmitArgs<'a> {
  /// Output assets, writable for the duration of the hook.
  pub assets: &'a mut dyn AssetStore,
  /// Shared error collection of the build.
  pub errors: &'a mut Vec<PluginError>,
}

/// Build-start handler.
pub type BuildStartHook = Box<dyn FnMut()>;
/// Typed tag-alteration handler; failures are pushed onto the build's error collection.
pub type AlterTagsHook = Box<dyn FnMut(&mut AlterTagsArgs<'_>)>;
/// Typed emission handler; failures are returned to the host as fatal.
pub type EmitHook = Box<dyn FnMut(&mut EmitArgs<'_>) -> Result<(), PluginError>>;

/// Host surface with one tap method per hook.
pub trait TypedHookHost {
  /// Register a handler for the start of every build.
  fn tap_compilation(&mut self, plugin: &'static str, hook: BuildStartHook);
  /// Register a handler for the tag-alteration hook.
  fn tap_alter_asset_tag_groups(&mut self, plugin: &'static str, hook: AlterTagsHook);
  /// Register a handler for the emission hook.
  fn tap_emit(&mut self, plugin: &'static str, hook: EmitHook);
}

/// Completion callback passed by legacy hosts.
pub type Completion = Box<dyn FnOnce(Result<(), PluginError>)>;

/// Event delivered to a legacy handler.
pub enum LegacyEvent<'e, 'a> {
  /// A build started.
  Compilation,
  /// A document's tags are ready for alteration.
  AlterAssetTags(&'e mut AlterTagsArgs<'a>),
  /// Output assets are being finalised.
  Emit(&'e mut EmitArgs<'a>),
}

/// Legacy handler registered by event name.
pub type LegacyHandler = Box<dyn FnMut(LegacyEvent<'_, '_>, Option<Completion>)>;

/// Host surface with a single event-name registration method.
pub trait LegacyHookHost {
  /// Register a handler for a named event.
  fn plugin(&mut self, event: &'static str, handler: LegacyHandler);
}

/// Registration capability exposed by a host.
pub enum HostHooks<'h> {
  /// Typed hooks are available.
  Typed(&'h mut dyn TypedHookHost),
  /// Only the legacy event API is available.
  Legacy(&'h mut dyn LegacyHookHost),
}

/// Host pipeline the plugin can be applied to.
pub trait Host {
  /// Report which registration convention the host supports.
  fn hooks(&mut self) -> HostHooks<'_>;
}

/// Registers the plugin's handlers using one host convention.
pub trait HookRegistrar {
  /// Register build-start, tag-alteration and emission handlers for `controller`.
  fn register(&mut self, controller: SharedController);
}

/// Registrar for hosts with typed hooks.
pub struct TypedHookRegistrar<'h> {
  host: &'h mut dyn TypedHookHost,
}

impl HookRegistrar for TypedHookRegistrar<'_> {
  fn register(&mut self, controller: SharedController) {
    let start = Rc::clone(&controller);
    self.host.tap_compilation(
      PLUGIN_NAME,
      Box::new(move || start.borrow_mut().begin_build()),
    );

    let alter = Rc::clone(&controller);
    self.host.tap_alter_asset_tag_groups(
      PLUGIN_NAME,
      Box::new(move |args: &mut AlterTagsArgs<'_>| {
        if let Err(err) = alter_tags(&alter, args) {
          args.errors.push(err);
        }
      }),
    );

    self.host.tap_emit(
      PLUGIN_NAME,
      Box::new(move |args: &mut EmitArgs<'_>| emit_assets(&controller, args)),
    );
  }
}

/// Registrar for hosts that only offer the legacy event API.
pub struct LegacyHookRegistrar<'h> {
  host: &'h mut dyn LegacyHookHost,
}

impl HookRegistrar for LegacyHookRegistrar<'_> {
  fn register(&mut self, controller: SharedController) {
    let start = Rc::clone(&controller);
    self.host.plugin(
      COMPILATION_EVENT,
      Box::new(move |event: LegacyEvent<'_, '_>, completion: Option<Completion>| {
        if matches!(event, LegacyEvent::Compilation) {
          start.borrow_mut().begin_build();
        }
        finish(completion, None, Ok(()));
      }),
    );

    let alter = Rc::clone(&controller);
    self.host.plugin(
      ALTER_ASSET_TAGS_EVENT,
      Box::new(move |event: LegacyEvent<'_, '_>, completion: Option<Completion>| match event {
        LegacyEvent::AlterAssetTags(args) => {
          let result = alter_tags(&alter, args);
          finish(completion, Some(&mut *args.errors), result);
        }
        _ => debug!("ignoring unexpected event for {ALTER_ASSET_TAGS_EVENT}"),
      }),
    );

    self.host.plugin(
      EMIT_EVENT,
      Box::new(move |event: LegacyEvent<'_, '_>, completion: Option<Completion>| match event {
        LegacyEvent::Emit(args) => {
          let result = emit_assets(&controller, args);
          finish(completion, Some(&mut *args.errors), result);
        }
        _ => debug!("ignoring unexpected event for {EMIT_EVENT}"),
      }),
    );
  }
}

/// Report a handler's outcome through the callback, or the error collection without one.
fn finish(
  completion: Option<Completion>,
  errors: Option<&mut Vec<PluginError>>,
  result: Result<(), PluginError>,
) {
  match (completion, result) {
    (Some(callback), result) => callback(result),
    (None, Err(err)) => {
      if let Some(errors) = errors {
        errors.push(err);
      }
    }
    (None, Ok(())) => {}
  }
}

fn alter_tags(controller: &SharedController, args: &mut AlterTagsArgs<'_>) -> Result<(), PluginError> {
  controller
    .borrow_mut()
    .alter_asset_tags(args.groups, args.assets, args.chunks, &args.context)
}

fn emit_assets(controller: &SharedController, args: &mut EmitArgs<'_>) -> Result<(), PluginError> {
  let removed = controller.borrow_mut().emit(&mut *args.assets)?;
  debug!("emit: removed {} inlined asset(s)", removed.len());
  Ok(())
}

/// Pick the registrar matching the host's capability.
pub fn select_registrar(host: &mut dyn Host) -> Box<dyn HookRegistrar + '_> {
  match host.hooks() {
    HostHooks::Typed(host) => Box::new(TypedHookRegistrar { host }),
    HostHooks::Legacy(host) => Box::new(LegacyHookRegistrar { host }),
  }
}

/// Plugin instance: normalised options plus an optional diagnostics sink.
#[derive(Debug, Clone)]
pub struct ScriptExtPlugin {
  options: Arc<Options>,
  logger: Option<Dispatch>,
}

impl ScriptExtPlugin {
  /// Create a plugin from normalised options.
  pub fn new(options: Options) -> Self {
    Self {
      options: Arc::new(options),
      logger: None,
    }
  }

  /// Route diagnostics to a specific subscriber instead of the ambient one.
  pub fn with_logger(mut self, logger: Dispatch) -> Self {
    self.logger = Some(logger);
    self
  }

  /// Shared options.
  pub fn options(&self) -> &Arc<Options> {
    &self.options
  }

  /// Fresh controller for an independent build driver.
  pub fn controller(&self) -> PipelineController {
    let controller = PipelineController::new(Arc::clone(&self.options));
    match &self.logger {
      Some(logger) => controller.with_logger(logger.clone()),
      None => controller,
    }
  }

  /// Register the plugin with a host, returning the controller its handlers share.
  pub fn apply(&self, host: &mut dyn Host) -> SharedController {
    let controller = Rc::new(RefCell::new(self.controller()));
    select_registrar(host).register(Rc::clone(&controller));
    controller
  }
}
