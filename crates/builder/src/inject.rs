//! Library injection seam

use crate::archive::PackageArchive;
use crate::context::BuildContext;
use crate::source::SourceTree;
use async_trait::async_trait;
use plugci_errors::Error;
use plugci_types::ProjectManifest;

/// Callback yielding the default namespace prefix libraries are shaded into
pub type NamespacePrefixFn<'a> = &'a (dyn Fn() -> String + Send + Sync);

/// Dependency-injection collaborator
///
/// Copies declared library code into the package archive. Runs after the
/// tree walk so injected entries never shadow project files.
#[async_trait]
pub trait DependencyInjector: Send + Sync {
    /// Inject every declared library into `archive`
    ///
    /// # Errors
    ///
    /// Returns an error when injection cannot complete; the builder records it
    /// as an internal error and carries on.
    async fn inject_libraries(
        &self,
        ctx: &BuildContext,
        archive: &mut PackageArchive,
        tree: &dyn SourceTree,
        manifest: &ProjectManifest,
        apis: &[String],
        namespace_prefix: NamespacePrefixFn<'_>,
    ) -> Result<(), Error>;
}

/// Injector used when no library hosting is configured
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopInjector;

#[async_trait]
impl DependencyInjector for NoopInjector {
    async fn inject_libraries(
        &self,
        _ctx: &BuildContext,
        _archive: &mut PackageArchive,
        _tree: &dyn SourceTree,
        _manifest: &ProjectManifest,
        _apis: &[String],
        _namespace_prefix: NamespacePrefixFn<'_>,
    ) -> Result<(), Error> {
        Ok(())
    }
}
