//! 路由目录加载 (RouteLoader)
//!
//! - [`RouteSource`] - 把一个目录变成有序的路由模块列表
//! - [`DirectoryRouteSource`] - 非递归扫描，跳过隐藏文件，按文件名排序
//! - [`ModuleLoader`] - 单个文件 → 路由数组，[`JsonRouteLoader`] 为内置实现

mod json;
mod loader;

pub use json::{JsonRouteLoader, RouteDefinition};
pub use loader::{DirectoryRouteSource, ModuleLoader, RouteModule, RouteSource};
