//! # Registration Classifier Tests
//!
//! End-to-end classification against snapshot-seeded stores.

#![allow(clippy::unwrap_used, clippy::panic)]

use comadmin_core::{
    Clsid, ComAdminError, InMemoryRegistry, RegistryView, ServerRegistration, ServerType,
    examine_server,
};

fn seeded(view: RegistryView, text: &str) -> InMemoryRegistry {
    let mut registry = InMemoryRegistry::new();
    registry.add_structure(view, text).unwrap();
    registry
}

fn clsid(s: &str) -> Clsid {
    s.parse().unwrap()
}

// =============================================================================
// FIXTURES
// =============================================================================

const DOT_NET_FRAMEWORK_SERVER: &str = r"
HKEY_CLASSES_ROOT
   CLSID
      {00000000-0000-0000-C0C0-000000000002}
         (Default) = DotNetFrameworkComServer.DotFrameworkComServer
         Implemented Categories
            {62C8FE65-4EBB-45e7-B440-6E39B2CDBF29}
         InprocServer32
            (Default) = mscoree.dll
            Assembly = DotNetFrameworkComServer, Version=0.1.2.3, Culture=neutral, PublicKeyToken=4de4d67b1b2c36c0
            Class = DotNetFrameworkComServer.DotFrameworkComServer
            RuntimeVersion = v4.0.30319
            ThreadingModel = Both
            CodeBase = file://Mac/Home/repos/ComAdmin.Tests/TestFiles/DotNetFrameworkComServer.DLL
            0.1.2.3
               Assembly = DotNetFrameworkComServer, Version=0.1.2.3, Culture=neutral, PublicKeyToken=4de4d67b1b2c36c0
               Class = DotNetFrameworkComServer.DotFrameworkComServer
               RuntimeVersion = v4.0.30319
               CodeBase = file://Mac/Home/repos/ComAdmin.Tests/TestFiles/DotNetFrameworkComServer.DLL
         ProgId
            (Default) = DotNetFrameworkComServer.DotFrameworkComServer
";

const DOT_NET_CORE_SERVER: &str = r"
HKEY_CLASSES_ROOT
   CLSID
      {93DEE2FF-1446-4119-A78D-60858BD38E9D}
         (Default) = CoreCLR COMHost Server
         InprocServer32
            (Default) = \\Mac\Home\repos\CountLinesExtension\bin\Debug\netcoreapp3.1\CountLinesExtension.comhost.dll
            ThreadingModel = Both
            ProgID
               (Default) = CountLinesExtension.CountLinesExtension
";

const NATIVE_SERVER: &str = r"
HKEY_CLASSES_ROOT
   CLSID
      {93CB110F-9189-4349-BD9F-392D9A4D0096}
         (Default) = Accessibility Control Panel
         InprocServer32
            (Default) = %SystemRoot%\System32\accessibilitycpl.dll
            ThreadingModel = Apartment
";

const CODE_BASE: &str = "file://Mac/Home/repos/ComAdmin.Tests/TestFiles/DotNetFrameworkComServer.DLL";
const ASSEMBLY: &str =
    "DotNetFrameworkComServer, Version=0.1.2.3, Culture=neutral, PublicKeyToken=4de4d67b1b2c36c0";

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn identifies_unregistered_server() {
    let registry = seeded(RegistryView::Registry64, "HKEY_CLASSES_ROOT\n   CLSID\n");
    let result = examine_server(
        &registry,
        RegistryView::Registry64,
        clsid("{00000000-1111-2222-3333-444444444444}"),
    )
    .unwrap();
    assert_eq!(result, ServerRegistration::NotRegistered);
    assert_eq!(result.server_type(), ServerType::NotRegistered);
    assert!(result.server().is_none());
}

#[test]
fn identifies_dot_net_framework_server() {
    let id = clsid("{00000000-0000-0000-C0C0-000000000002}");
    let registry = seeded(RegistryView::Registry64, DOT_NET_FRAMEWORK_SERVER);

    let result = examine_server(&registry, RegistryView::Registry64, id).unwrap();
    assert_eq!(result.server_type(), ServerType::DotNetFrameworkAssembly);

    let ServerRegistration::LegacyManaged {
        server,
        root_assembly,
        assembly_versions,
    } = result
    else {
        panic!("expected legacy managed server");
    };

    assert_eq!(server.clsid, id);
    assert_eq!(
        server.display_name.as_deref(),
        Some("DotNetFrameworkComServer.DotFrameworkComServer")
    );
    assert_eq!(server.module_path, "mscoree.dll");
    assert_eq!(server.threading_model.as_deref(), Some("Both"));

    assert_eq!(root_assembly.assembly_identity.as_deref(), Some(ASSEMBLY));
    assert_eq!(
        root_assembly.class_name.as_deref(),
        Some("DotNetFrameworkComServer.DotFrameworkComServer")
    );
    assert_eq!(root_assembly.runtime_version.as_deref(), Some("v4.0.30319"));
    assert_eq!(root_assembly.code_base.as_deref(), Some(CODE_BASE));

    assert_eq!(assembly_versions.len(), 1);
    let version = &assembly_versions["0.1.2.3"];
    assert_eq!(version.assembly_identity.as_deref(), Some(ASSEMBLY));
    assert_eq!(
        version.class_name.as_deref(),
        Some("DotNetFrameworkComServer.DotFrameworkComServer")
    );
    assert_eq!(version.runtime_version.as_deref(), Some("v4.0.30319"));
    assert_eq!(version.code_base.as_deref(), Some(CODE_BASE));
}

#[test]
fn identifies_dot_net_core_server() {
    let id = clsid("{93DEE2FF-1446-4119-A78D-60858BD38E9D}");
    let registry = seeded(RegistryView::Registry64, DOT_NET_CORE_SERVER);

    let result = examine_server(&registry, RegistryView::Registry64, id).unwrap();
    let ServerRegistration::ModernManaged { server, prog_id } = result else {
        panic!("expected modern managed server");
    };

    assert_eq!(server.clsid, id);
    assert_eq!(server.display_name.as_deref(), Some("CoreCLR COMHost Server"));
    assert_eq!(
        server.module_path,
        r"\\Mac\Home\repos\CountLinesExtension\bin\Debug\netcoreapp3.1\CountLinesExtension.comhost.dll"
    );
    assert_eq!(server.threading_model.as_deref(), Some("Both"));
    assert_eq!(
        prog_id.as_deref(),
        Some("CountLinesExtension.CountLinesExtension")
    );
}

#[test]
fn identifies_native_server() {
    let id = clsid("{93CB110F-9189-4349-BD9F-392D9A4D0096}");
    let registry = seeded(RegistryView::Registry64, NATIVE_SERVER);

    let result = examine_server(&registry, RegistryView::Registry64, id).unwrap();
    let ServerRegistration::Native(server) = result else {
        panic!("expected native server");
    };

    assert_eq!(server.clsid, id);
    assert_eq!(
        server.display_name.as_deref(),
        Some("Accessibility Control Panel")
    );
    assert_eq!(
        server.module_path,
        r"%SystemRoot%\System32\accessibilitycpl.dll"
    );
    assert_eq!(server.threading_model.as_deref(), Some("Apartment"));
}

// =============================================================================
// PARTIAL REGISTRATIONS
// =============================================================================

#[test]
fn class_key_without_inproc_server_is_unknown() {
    let id = clsid("{11111111-2222-3333-4444-555555555555}");
    let registry = seeded(
        RegistryView::Registry64,
        r"
HKEY_CLASSES_ROOT
   CLSID
      {11111111-2222-3333-4444-555555555555}
         (Default) = Half Installed
         ProgId
            (Default) = Half.Installed
",
    );

    let result = examine_server(&registry, RegistryView::Registry64, id).unwrap();
    assert_eq!(
        result,
        ServerRegistration::Unknown {
            clsid: id,
            display_name: Some("Half Installed".to_string()),
        }
    );
    assert_eq!(result.server_type(), ServerType::Unknown);
}

#[test]
fn inproc_server_without_module_path_is_unknown() {
    let id = clsid("{11111111-2222-3333-4444-555555555555}");
    let registry = seeded(
        RegistryView::Registry64,
        r"
HKEY_CLASSES_ROOT
   CLSID
      {11111111-2222-3333-4444-555555555555}
         InprocServer32
            ThreadingModel = Both
",
    );

    let result = examine_server(&registry, RegistryView::Registry64, id).unwrap();
    assert_eq!(
        result,
        ServerRegistration::Unknown {
            clsid: id,
            display_name: None,
        }
    );
}

// =============================================================================
// STORE AND VIEW
// =============================================================================

#[test]
fn views_are_examined_independently() {
    let id = clsid("{93CB110F-9189-4349-BD9F-392D9A4D0096}");
    let mut registry = seeded(RegistryView::Registry32, NATIVE_SERVER);
    registry
        .add_structure(RegistryView::Registry64, "HKEY_CLASSES_ROOT\n   CLSID\n")
        .unwrap();

    let in_32 = examine_server(&registry, RegistryView::Registry32, id).unwrap();
    let in_64 = examine_server(&registry, RegistryView::Registry64, id).unwrap();
    assert_eq!(in_32.server_type(), ServerType::NativeDll);
    assert_eq!(in_64, ServerRegistration::NotRegistered);
}

#[test]
fn unseeded_view_is_store_unavailable() {
    let registry = seeded(RegistryView::Registry64, NATIVE_SERVER);
    let result = examine_server(
        &registry,
        RegistryView::Registry32,
        clsid("{93CB110F-9189-4349-BD9F-392D9A4D0096}"),
    );
    assert!(matches!(
        result,
        Err(ComAdminError::StoreUnavailable {
            view: RegistryView::Registry32,
            ..
        })
    ));
}

#[test]
fn clsid_lookup_ignores_case() {
    let registry = seeded(
        RegistryView::Registry64,
        r"
HKEY_CLASSES_ROOT
   CLSID
      {93dee2ff-1446-4119-a78d-60858bd38e9d}
         (Default) = lower case
         InprocServer32
            (Default) = lower.dll
",
    );
    let result = examine_server(
        &registry,
        RegistryView::Registry64,
        clsid("{93DEE2FF-1446-4119-A78D-60858BD38E9D}"),
    )
    .unwrap();
    assert_eq!(result.server_type(), ServerType::NativeDll);
}

#[test]
fn several_servers_in_one_store() {
    let mut registry = seeded(RegistryView::Registry64, DOT_NET_FRAMEWORK_SERVER);
    registry
        .add_structure(RegistryView::Registry64, DOT_NET_CORE_SERVER)
        .unwrap();
    registry
        .add_structure(RegistryView::Registry64, NATIVE_SERVER)
        .unwrap();

    let types: Vec<ServerType> = [
        "{00000000-0000-0000-C0C0-000000000002}",
        "{93DEE2FF-1446-4119-A78D-60858BD38E9D}",
        "{93CB110F-9189-4349-BD9F-392D9A4D0096}",
        "{00000000-1111-2222-3333-444444444444}",
    ]
    .iter()
    .map(|id| {
        examine_server(&registry, RegistryView::Registry64, clsid(id))
            .unwrap()
            .server_type()
    })
    .collect();

    assert_eq!(
        types,
        vec![
            ServerType::DotNetFrameworkAssembly,
            ServerType::DotNetCoreAssembly,
            ServerType::NativeDll,
            ServerType::NotRegistered,
        ]
    );
}
