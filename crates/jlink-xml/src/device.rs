//! Device name resolution.
//!
//! `JLinkDevices.xml` files come in two shapes: flat records carrying the
//! name directly (`<Device Name="..."/>`) and wrapped records where the name
//! lives on a `ChipInfo` child. Vendors are inconsistent about casing, so all
//! tag and attribute comparisons ignore case.

use crate::tree::Element;

const NAME: &str = "name";
const DEVICE_TAG: &str = "device";
const CHIP_INFO_TAG: &str = "chipinfo";

/// Resolve the identity key of a device element.
///
/// Lookup order:
/// 1. the element's own `Name`/`name` attribute, then any attribute spelled
///    "name" in another casing;
/// 2. for `Device` elements, the name attribute of a `ChipInfo` child;
/// 3. for `Device` elements, the first child that resolves recursively.
///
/// Returns `None` when no name can be found.
pub fn device_name(element: &Element) -> Option<&str> {
    if let Some(name) = own_name(element) {
        return Some(name);
    }
    if !element.tag_is(DEVICE_TAG) {
        return None;
    }
    for info in element.elements().filter(|child| child.tag_is(CHIP_INFO_TAG)) {
        if let Some(name) = info.attribute_ignore_case(NAME) {
            return Some(name);
        }
        if let Some(name) = device_name(info) {
            return Some(name);
        }
    }
    element.elements().find_map(device_name)
}

/// Resolved names of the root's direct children, `None` for unnamed entries.
pub fn registry_names(root: &Element) -> Vec<Option<&str>> {
    root.elements().map(device_name).collect()
}

fn own_name(element: &Element) -> Option<&str> {
    // An empty `Name` does not win over a populated `name`, but the
    // case-insensitive scan accepts whatever it finds first.
    element
        .attribute("Name")
        .filter(|value| !value.is_empty())
        .or_else(|| element.attribute("name").filter(|value| !value.is_empty()))
        .or_else(|| element.attribute_ignore_case(NAME))
}
