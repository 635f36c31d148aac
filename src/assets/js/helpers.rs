//! Syntax-lowering helpers
//!
//! Lowered syntax such as `async` functions or object spread calls helper
//! functions imported from `@oxc-project/runtime/helpers/<name>`. Those
//! specifiers resolve here, ahead of `node_modules`, so bundles never depend
//! on the runtime package being installed.

/// Specifier prefix the transformer imports helpers from
pub const HELPER_PREFIX: &str = "@oxc-project/runtime/helpers/";

const HELPERS: &[(&str, &str)] = &[
    ("OverloadYield", include_str!("helpers/OverloadYield.js")),
    ("assertClassBrand", include_str!("helpers/assertClassBrand.js")),
    ("asyncGeneratorDelegate", include_str!("helpers/asyncGeneratorDelegate.js")),
    ("asyncIterator", include_str!("helpers/asyncIterator.js")),
    ("asyncToGenerator", include_str!("helpers/asyncToGenerator.js")),
    ("awaitAsyncGenerator", include_str!("helpers/awaitAsyncGenerator.js")),
    ("checkInRHS", include_str!("helpers/checkInRHS.js")),
    ("classPrivateFieldGet2", include_str!("helpers/classPrivateFieldGet2.js")),
    ("classPrivateFieldInitSpec", include_str!("helpers/classPrivateFieldInitSpec.js")),
    ("classPrivateFieldSet2", include_str!("helpers/classPrivateFieldSet2.js")),
    ("classPrivateMethodInitSpec", include_str!("helpers/classPrivateMethodInitSpec.js")),
    ("defineProperty", include_str!("helpers/defineProperty.js")),
    ("extends", include_str!("helpers/extends.js")),
    ("objectDestructuringEmpty", include_str!("helpers/objectDestructuringEmpty.js")),
    ("objectSpread2", include_str!("helpers/objectSpread2.js")),
    ("objectWithoutProperties", include_str!("helpers/objectWithoutProperties.js")),
    ("readOnlyError", include_str!("helpers/readOnlyError.js")),
    ("superPropGet", include_str!("helpers/superPropGet.js")),
    ("superPropSet", include_str!("helpers/superPropSet.js")),
    ("taggedTemplateLiteral", include_str!("helpers/taggedTemplateLiteral.js")),
    ("toPropertyKey", include_str!("helpers/toPropertyKey.js")),
    ("toSetter", include_str!("helpers/toSetter.js")),
    ("wrapAsyncGenerator", include_str!("helpers/wrapAsyncGenerator.js")),
    ("writeOnlyError", include_str!("helpers/writeOnlyError.js")),
];

/// The name and CommonJS source of the helper a specifier refers to
pub fn lookup(specifier: &str) -> Option<(&'static str, &'static str)> {
    let name = specifier.strip_prefix(HELPER_PREFIX)?;
    let name = name.strip_suffix(".js").unwrap_or(name);
    HELPERS.iter().find(|(helper, _)| *helper == name).copied()
}
