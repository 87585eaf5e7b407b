use serde::{Deserialize, Serialize};

/// A name returned by `LIST`, exactly as the server reported it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedFolder {
    /// The full, server-side mailbox name, e.g. `INBOX/Receipts`.
    pub name: String,
    /// The hierarchy delimiter, or `None` for a flat namespace.
    pub delimiter: Option<String>,
    /// Name attributes such as `\Noselect` or `\HasChildren`.
    pub attributes: Vec<String>,
}

/// One level of the folder hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    /// The last component of the folder's name.
    pub name: String,
    /// The components from the root down to this folder, joined with `.`.
    pub path: String,
    /// The server's hierarchy delimiter.
    pub delimiter: Option<String>,
    /// Name attributes as listed by the server. Levels the server never listed carry
    /// `\Noselect`.
    pub attributes: Vec<String>,
    /// Child folders, in the order the server listed them.
    pub children: Vec<FolderNode>,
}

/// Output shapes of a folder listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderMode {
    /// Dot-joined paths, parents before children.
    #[default]
    Flat,
    /// The hierarchy as received.
    Raw,
    /// Nodes ready for a tree widget.
    Tree,
}

/// The result of a folder listing, shaped by [`FolderMode`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FolderView {
    /// See [`FolderMode::Flat`].
    Flat(Vec<String>),
    /// See [`FolderMode::Raw`].
    Raw(Vec<FolderNode>),
    /// See [`FolderMode::Tree`].
    Tree(Vec<TreeNode>),
}

/// A folder as a tree-widget node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    /// `<connection key>_folder_<path>`.
    pub id: String,
    /// Display name.
    pub text: String,
    /// Always `EmailFolder`.
    #[serde(rename = "type")]
    pub node_type: &'static str,
    /// What the folder is called and how it can be used.
    pub data: TreeData,
    /// Child folders, in the order the server listed them.
    pub children: Vec<TreeNode>,
}

/// The payload carried by a [`TreeNode`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreeData {
    /// The dot-joined path.
    pub name: String,
    /// The LIST attributes, such as `\Noselect`.
    pub attribs: Vec<String>,
    /// The server's hierarchy delimiter.
    pub delimiter: Option<String>,
}
